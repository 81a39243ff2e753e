//! File listing route.

use axum::{
    Json,
    extract::{Path, State},
};
use pdf_merger_core::UploadedFile;
use serde::Serialize;
use std::sync::Arc;

use crate::helpers::{RouteResult, parse_session_id};
use crate::state::AppState;

#[derive(Serialize)]
pub struct FilesResponse {
    pub session_id: String,
    pub files: Vec<UploadedFile>,
}

/// Files of a session in upload order.
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> RouteResult<Json<FilesResponse>> {
    let id = parse_session_id(&session_id)?;
    let files = state.merger.list_files(&id).await?;

    Ok(Json(FilesResponse {
        session_id: id.to_string(),
        files,
    }))
}
