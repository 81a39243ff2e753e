//! Disk-backed storage for uploaded PDFs.
//!
//! Each session gets a scratch directory `<upload_root>/<session_id>` holding
//! one file per upload, named `<id>_<sanitized name>`. The directory exists
//! only while the session has at least one file.
//!
//! ## Lock discipline
//!
//! `add_files` holds the session lock across id assignment, the write and
//! the page-count parse, which serializes concurrent uploads to the same
//! session. Reads (`list_files`, `preview`) hold it only long enough to copy
//! the file record out; the file itself is read after the lock is released.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::MutexGuard;
use tracing::{debug, info, warn};

use crate::config::MergerConfig;
use crate::error::{Error, Result};
use crate::pdf::{self, PdfDocument};
use crate::session::{Session, SessionId, SessionManager, SharedSession};
use crate::util::{remove_dir_if_exists, sanitize_filename};

/// A stored upload. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Unique within the session, increasing in upload order
    pub id: u32,
    /// Sanitized client filename
    pub display_name: String,
    /// Location on disk (never sent to clients)
    #[serde(skip)]
    pub storage_path: PathBuf,
    pub page_count: usize,
}

/// One file as received from a client
#[derive(Debug, Clone)]
pub struct RawFile {
    pub filename: String,
    pub bytes: Bytes,
}

impl RawFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

/// Removes a session's storage directory when dropped.
///
/// Armed at the start of a merge so the directory goes away on every exit
/// path, including early returns and panics.
#[must_use = "the directory is removed when the guard is dropped"]
pub(crate) struct StorageGuard {
    dir: PathBuf,
}

impl Drop for StorageGuard {
    fn drop(&mut self) {
        match remove_dir_if_exists(&self.dir) {
            Ok(true) => debug!("Removed session storage {}", self.dir.display()),
            Ok(false) => {}
            Err(e) => warn!("Failed to remove {}: {}", self.dir.display(), e),
        }
    }
}

/// Per-session upload storage
pub struct UploadStore {
    config: Arc<MergerConfig>,
    sessions: Arc<SessionManager>,
}

impl UploadStore {
    pub const fn new(config: Arc<MergerConfig>, sessions: Arc<SessionManager>) -> Self {
        Self { config, sessions }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Scratch directory of a session.
    pub fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.config.upload_root.join(id.to_string())
    }

    pub(crate) fn storage_guard(&self, id: &SessionId) -> StorageGuard {
        StorageGuard {
            dir: self.session_dir(id),
        }
    }

    /// Lock a live session, `NotFound` when it is unknown or already closed.
    async fn lock_session<'a>(
        id: &SessionId,
        handle: &'a SharedSession,
    ) -> Result<MutexGuard<'a, Session>> {
        let session = handle.lock().await;
        if session.closed {
            return Err(Error::NotFound(format!("session {id}")));
        }
        Ok(session)
    }

    async fn handle(&self, id: &SessionId) -> Result<SharedSession> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("session {id}")))
    }

    /// Validate, store and parse a batch of uploads.
    ///
    /// Returns only the files added by this call. Files that fail to parse are
    /// dropped without consuming an id.
    pub async fn add_files(&self, id: &SessionId, files: Vec<RawFile>) -> Result<Vec<UploadedFile>> {
        let size: usize = files.iter().map(|f| f.bytes.len()).sum();
        if size > self.config.max_upload_bytes {
            return Err(Error::PayloadTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }

        let (accepted, rejected): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|f| self.config.is_allowed(&f.filename));

        for file in &rejected {
            warn!("Rejected {}: extension not allowed", file.filename);
        }

        if accepted.is_empty() {
            return Err(Error::InvalidInput(
                "no PDF files in upload".to_string(),
            ));
        }

        let handle = self.handle(id).await?;
        let mut session = Self::lock_session(id, &handle).await?;

        let dir = self.session_dir(id);
        tokio::fs::create_dir_all(&dir).await?;

        let result = Self::store_batch(&mut session, &dir, accepted).await;

        if session.files.is_empty() {
            remove_dir(&dir).await;
        }
        session.touch();

        let added = result?;
        info!(
            "Added {} of {} files to session {} ({} total)",
            added.len(),
            added.len() + rejected.len(),
            id,
            session.files.len()
        );
        Ok(added)
    }

    async fn store_batch(
        session: &mut Session,
        dir: &Path,
        files: Vec<RawFile>,
    ) -> Result<Vec<UploadedFile>> {
        let mut added = Vec::with_capacity(files.len());

        for raw in files {
            let display_name = sanitize_filename(&raw.filename);
            let file_id = session.next_file_id();
            let storage_path = dir.join(format!("{file_id}_{display_name}"));

            tokio::fs::write(&storage_path, &raw.bytes).await?;

            match parse_page_count(raw.bytes).await {
                Ok(page_count) => {
                    debug!(
                        "Stored {} as #{} ({} pages) at {}",
                        display_name,
                        file_id,
                        page_count,
                        storage_path.display()
                    );
                    let file = UploadedFile {
                        id: file_id,
                        display_name,
                        storage_path,
                        page_count,
                    };
                    session.files.push(file.clone());
                    added.push(file);
                }
                Err(e) => {
                    warn!("Dropping {}: {}", display_name, e);
                    if let Err(e) = tokio::fs::remove_file(&storage_path).await {
                        warn!("Failed to remove {}: {}", storage_path.display(), e);
                    }
                }
            }
        }

        Ok(added)
    }

    /// Files of a session in upload order.
    pub async fn list_files(&self, id: &SessionId) -> Result<Vec<UploadedFile>> {
        let handle = self.handle(id).await?;
        let mut session = Self::lock_session(id, &handle).await?;
        session.touch();
        Ok(session.files.clone())
    }

    /// First page of an uploaded file as a standalone one-page PDF.
    pub async fn preview(&self, id: &SessionId, file_id: u32) -> Result<Vec<u8>> {
        let file = {
            let handle = self.handle(id).await?;
            let mut session = Self::lock_session(id, &handle).await?;
            session.touch();
            let file = session.file(file_id).cloned();
            file.ok_or_else(|| Error::NotFound(format!("file {file_id} in session {id}")))?
        };

        let bytes = tokio::fs::read(&file.storage_path)
            .await
            .map_err(|e| Error::Render(format!("{}: {e}", file.display_name)))?;

        let name = file.display_name.clone();
        tokio::task::spawn_blocking(move || pdf::extract_page(&bytes, 0))
            .await
            .map_err(|e| Error::Render(format!("preview task failed: {e}")))?
            .map_err(|e| Error::render_for(&name, &e))
    }

    /// Discard a session and delete its storage. Safe to repeat.
    ///
    /// Storage is only removed by the call that takes the session, so a
    /// clear racing an in-flight merge leaves the merge's files in place.
    pub async fn clear(&self, id: &SessionId) {
        if self.sessions.take(id).await.is_some() {
            remove_dir(&self.session_dir(id)).await;
            info!("Cleared session {}", id);
        }
    }

    /// Clear every session idle for longer than `ttl`.
    ///
    /// Returns the number of sessions cleared.
    pub async fn cleanup_expired(&self, ttl: Duration) -> usize {
        let expired = self.sessions.expired(ttl).await;
        for id in &expired {
            self.clear(id).await;
        }
        expired.len()
    }
}

/// Parse page count off the async runtime.
async fn parse_page_count(bytes: Bytes) -> Result<usize> {
    tokio::task::spawn_blocking(move || PdfDocument::from_bytes(bytes.to_vec()))
        .await
        .map_err(|e| Error::Render(format!("parser task failed: {e}")))?
        .map(|doc| doc.page_count())
}

async fn remove_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed session storage {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
    }
}
