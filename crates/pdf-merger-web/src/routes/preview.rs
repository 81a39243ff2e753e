//! Preview route - first page of an upload as a standalone PDF.

use axum::{
    body::Body,
    extract::{Path, State, rejection::PathRejection},
    http::{StatusCode, header},
    response::Response,
};
use std::sync::Arc;

use crate::helpers::{ResultExt, RouteResult, parse_session_id};
use crate::state::AppState;

pub async fn preview_file(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, u32)>, PathRejection>,
) -> RouteResult<Response> {
    let Path((session_id, file_id)) = path?;
    let id = parse_session_id(&session_id)?;
    let pdf = state.merger.preview(&id, file_id).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/pdf")
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"preview_{file_id}.pdf\""),
        )
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(pdf))
        .or_internal_error()
}
