//! Helper types and traits for cleaner route handlers.
//!
//! Every handler returns [`RouteResult`]; core errors convert into
//! [`ApiError`] with `?` and render as `{ "error": .., "status": .. }`.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pdf_merger_core::{Error, SessionId};
use serde_json::json;
use tracing::error;

/// Standard result type for route handlers.
pub type RouteResult<T> = Result<T, ApiError>;

/// Error response of the JSON API
#[derive(Debug)]
pub enum ApiError {
    /// A failure reported by the merger
    Core(Error),
    /// A failure with an explicit status (request parsing, response building)
    Status(StatusCode, String),
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => status_for(err),
            Self::Status(status, _) => *status,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

// Extractor rejections keep axum's status but use the JSON error body.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Status(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Status(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Status(rejection.status(), rejection.body_text())
    }
}

/// HTTP status for a core error.
pub const fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::Render(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::Core(err) => {
                if status.is_server_error() {
                    error!("Request failed: {}", err);
                }
                err.to_string()
            }
            Self::Status(_, msg) => msg,
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

/// Extension trait for converting `Result<T, E>` to `RouteResult<T>`.
pub trait ResultExt<T, E: std::fmt::Display> {
    /// Converts the error to 500 Internal Server Error.
    fn or_internal_error(self) -> RouteResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T, E> for Result<T, E> {
    fn or_internal_error(self) -> RouteResult<T> {
        self.map_err(|e| ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

/// Parse a session id from a path segment; malformed ids are unknown ids.
pub fn parse_session_id(raw: &str) -> RouteResult<SessionId> {
    Ok(raw.parse::<SessionId>()?)
}
