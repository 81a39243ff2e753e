//! Upload route - multipart PDF upload.

use axum::{Json, extract::State};
use axum_extra::extract::Multipart;
use pdf_merger_core::{Error, RawFile, SessionId, UploadedFile};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::helpers::{ApiError, RouteResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct UploadResponse {
    pub session_id: String,
    /// Files added by this request
    pub files: Vec<UploadedFile>,
    /// Every file now in the session
    pub all_files: Vec<UploadedFile>,
}

/// Accept one or more `files` fields and an optional `session_id` field.
///
/// Fields may arrive in any order, so the whole body is read before the
/// session is resolved.
pub async fn upload_files(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> RouteResult<Json<UploadResponse>> {
    let mut provided_session = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Status(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "session_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Status(e.status(), e.body_text()))?;
                provided_session = Some(value);
            }
            "files" | "files[]" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Status(e.status(), e.body_text()))?;
                if filename.is_empty() && bytes.is_empty() {
                    // Browsers send an empty part for an empty file input
                    continue;
                }
                files.push(RawFile::new(filename, bytes));
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(Error::InvalidInput("no files in upload".to_string()).into());
    }

    let merger = &state.merger;
    let provided_session = provided_session.as_deref().filter(|s| !s.is_empty());
    let session = merger.get_or_create_session(provided_session).await;
    let created = provided_session.and_then(|s| s.parse::<SessionId>().ok()) != Some(session);

    let received = files.len();
    let added = match merger.add_files(&session, files).await {
        Ok(added) => added,
        Err(e) => {
            // The client never learns a session minted for a rejected batch
            if created {
                merger.clear(&session).await;
            }
            return Err(e.into());
        }
    };
    let all_files = merger.list_files(&session).await?;

    info!(
        "Upload to session {}: {} of {} files accepted",
        session,
        added.len(),
        received
    );

    Ok(Json(UploadResponse {
        session_id: session.to_string(),
        files: added,
        all_files,
    }))
}
