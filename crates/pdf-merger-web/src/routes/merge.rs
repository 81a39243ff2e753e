//! Merge route - returns the merged PDF as a download.

use axum::{
    Json,
    body::Body,
    extract::{Path, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::Response,
};
use pdf_merger_core::MergeRequest;
use std::sync::Arc;

use crate::helpers::{ResultExt, RouteResult, parse_session_id};
use crate::state::AppState;

/// Response header telling the client whether page numbers were drawn.
pub const PAGE_NUMBERS_HEADER: &str = "x-page-numbers";

/// Merge the session's files in the requested order.
///
/// The session is gone afterwards whether or not the merge succeeded,
/// including when the request body cannot be parsed.
pub async fn merge_files(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    request: Result<Json<MergeRequest>, JsonRejection>,
) -> RouteResult<Response> {
    let id = parse_session_id(&session_id)?;
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            state.merger.clear(&id).await;
            return Err(rejection.into());
        }
    };
    let merged = state.merger.merge(&id, &request).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", merged.filename),
        )
        .header(PAGE_NUMBERS_HEADER, merged.page_numbers.as_str())
        .body(Body::from(merged.bytes))
        .or_internal_error()
}
