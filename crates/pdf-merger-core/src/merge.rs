//! Merge pipeline: resolve the requested order, merge, optionally number
//! pages, and always discard the session afterwards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{MERGED_FILENAME, UnknownIdPolicy};
use crate::error::{Error, Result};
use crate::numbering::PageNumberStamper;
use crate::pdf::{self, PdfDocument};
use crate::session::SessionId;
use crate::store::{UploadStore, UploadedFile};

/// Client request for a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// File ids in the desired output order; duplicates are honoured
    #[serde(rename = "files", default)]
    pub ordered_file_ids: Vec<u32>,

    #[serde(rename = "addPageNumbers", default)]
    pub add_page_numbers: bool,
}

impl MergeRequest {
    pub const fn new(ordered_file_ids: Vec<u32>, add_page_numbers: bool) -> Self {
        Self {
            ordered_file_ids,
            add_page_numbers,
        }
    }
}

/// Outcome of the page-numbering step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNumbering {
    NotRequested,
    Applied,
    /// Requested but not applied; holds the reason
    Skipped(String),
}

impl PageNumbering {
    /// Short form used in the `X-Page-Numbers` response header
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequested => "not-requested",
            Self::Applied => "applied",
            Self::Skipped(_) => "skipped",
        }
    }
}

/// A finished merge, ready to hand to the client
#[derive(Debug, Clone)]
pub struct MergedDocument {
    pub bytes: Vec<u8>,
    pub filename: &'static str,
    pub page_count: usize,
    pub page_numbers: PageNumbering,
}

pub struct MergePipeline {
    store: Arc<UploadStore>,
    stamper: Arc<dyn PageNumberStamper>,
    unknown_ids: UnknownIdPolicy,
}

impl MergePipeline {
    pub const fn new(
        store: Arc<UploadStore>,
        stamper: Arc<dyn PageNumberStamper>,
        unknown_ids: UnknownIdPolicy,
    ) -> Self {
        Self {
            store,
            stamper,
            unknown_ids,
        }
    }

    pub fn stamper(&self) -> &dyn PageNumberStamper {
        self.stamper.as_ref()
    }

    /// Merge the requested files of a session.
    ///
    /// The session is discarded and its storage removed whatever the outcome.
    /// Only the call that takes the session owns its storage; a concurrent
    /// merge or clear of the same id gets `NotFound` and leaves it alone.
    pub async fn merge(&self, id: &SessionId, request: &MergeRequest) -> Result<MergedDocument> {
        let Some(session) = self.store.sessions().take(id).await else {
            return Err(Error::NotFound(format!("session {id}")));
        };
        let _cleanup = self.store.storage_guard(id);
        let files = std::mem::take(&mut session.lock().await.files);

        if files.is_empty() {
            return Err(Error::NotFound(format!("no files uploaded in session {id}")));
        }

        let resolved = self.resolve(&files, &request.ordered_file_ids)?;
        if resolved.is_empty() {
            return Err(Error::InvalidInput("no valid files selected".to_string()));
        }

        info!(
            "Merging {} files for session {} (page numbers: {})",
            resolved.len(),
            id,
            request.add_page_numbers
        );

        let mut documents = Vec::with_capacity(resolved.len());
        for file in &resolved {
            let bytes = tokio::fs::read(&file.storage_path)
                .await
                .map_err(|e| Error::Merge(format!("{}: {e}", file.display_name)))?;
            documents.push(bytes);
        }

        let merged = tokio::task::spawn_blocking(move || {
            let merged = PdfDocument::from_bytes(pdf::merge_documents(&documents)?)?;
            let page_count = merged.page_count();
            Ok::<_, Error>((merged.into_bytes(), page_count))
        })
        .await
        .map_err(|e| {
            error!("Merge task failed: {}", e);
            Error::Merge(format!("merge task failed: {e}"))
        })?
        .map_err(|e| match e {
            Error::Merge(cause) => Error::Merge(cause),
            other => Error::Merge(other.to_string()),
        })?;
        let (merged, page_count) = merged;

        let (bytes, page_numbers) = if request.add_page_numbers {
            self.apply_page_numbers(merged).await
        } else {
            (merged, PageNumbering::NotRequested)
        };

        info!("Merged session {} into {} pages", id, page_count);

        Ok(MergedDocument {
            bytes,
            filename: MERGED_FILENAME,
            page_count,
            page_numbers,
        })
    }

    /// Map requested ids to files in caller order.
    fn resolve(&self, files: &[UploadedFile], requested: &[u32]) -> Result<Vec<UploadedFile>> {
        let mut resolved = Vec::with_capacity(requested.len());
        let mut unknown = Vec::new();

        for &file_id in requested {
            match files.iter().find(|f| f.id == file_id) {
                Some(file) => resolved.push(file.clone()),
                None => unknown.push(file_id),
            }
        }

        if !unknown.is_empty() {
            match self.unknown_ids {
                UnknownIdPolicy::Skip => warn!("Skipping unknown file ids {:?}", unknown),
                UnknownIdPolicy::Reject => {
                    return Err(Error::InvalidInput(format!("unknown file ids {unknown:?}")));
                }
            }
        }

        debug!(
            "Resolved order: {:?}",
            resolved.iter().map(|f| f.id).collect::<Vec<_>>()
        );
        Ok(resolved)
    }

    /// Best-effort numbering; on any failure the input is returned unchanged.
    async fn apply_page_numbers(&self, merged: Vec<u8>) -> (Vec<u8>, PageNumbering) {
        let merged = Arc::new(merged);
        let input = Arc::clone(&merged);
        let stamper = Arc::clone(&self.stamper);

        let result = tokio::task::spawn_blocking(move || stamper.stamp(&input))
            .await
            .map_err(|e| {
                error!("Page numbering task failed: {}", e);
                Error::PageNumbers(e.to_string())
            })
            .and_then(|r| r);

        match result {
            Ok(stamped) => (stamped, PageNumbering::Applied),
            Err(e) => {
                warn!("Returning merge without page numbers: {}", e);
                let bytes = Arc::try_unwrap(merged).unwrap_or_else(|shared| (*shared).clone());
                (bytes, PageNumbering::Skipped(e.to_string()))
            }
        }
    }
}
