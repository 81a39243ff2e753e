//! PDF Merger Core Library
//!
//! Session-scoped upload, reorder, preview and merge of PDF documents:
//! - Upload storage with per-session scratch directories
//! - Session tracking and UI preferences
//! - Merging in a caller-chosen order via `lopdf`
//! - Optional `Page i of n` numbering of the merged result

pub mod config;
pub mod error;
pub mod merge;
pub mod numbering;
pub mod pdf;
pub mod session;
pub mod store;
pub mod util;

pub use config::{MergerConfig, PageNumberConfig, UnknownIdPolicy, MERGED_FILENAME};
pub use error::{Error, Result};
pub use merge::{MergePipeline, MergeRequest, MergedDocument, PageNumbering};
pub use numbering::{create_stamper, HelveticaStamper, PageNumberStamper, UnavailableStamper};
pub use pdf::PdfDocument;
pub use session::{MemoryBackend, Preferences, SessionBackend, SessionId, SessionManager};
pub use store::{RawFile, UploadStore, UploadedFile};

use std::sync::Arc;
use tracing::info;

/// High-level handle that combines the store, sessions and merge pipeline
pub struct PdfMerger {
    config: Arc<MergerConfig>,
    store: Arc<UploadStore>,
    pipeline: MergePipeline,
}

impl PdfMerger {
    /// Create a merger with in-memory sessions and the configured stamper
    pub fn new(config: MergerConfig) -> Result<Self> {
        let stamper = create_stamper(&config.page_numbers);
        Self::build(config, Arc::new(MemoryBackend::new()), stamper)
    }

    /// Create with a custom session backend
    pub fn with_backend(config: MergerConfig, backend: Arc<dyn SessionBackend>) -> Result<Self> {
        let stamper = create_stamper(&config.page_numbers);
        Self::build(config, backend, stamper)
    }

    /// Create with a custom page-number stamper
    pub fn with_stamper(config: MergerConfig, stamper: Arc<dyn PageNumberStamper>) -> Result<Self> {
        Self::build(config, Arc::new(MemoryBackend::new()), stamper)
    }

    fn build(
        config: MergerConfig,
        backend: Arc<dyn SessionBackend>,
        stamper: Arc<dyn PageNumberStamper>,
    ) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.upload_root)?;

        info!(
            "Upload root {} (limit {} bytes, page numbers: {})",
            config.upload_root.display(),
            config.max_upload_bytes,
            stamper.name()
        );

        let config = Arc::new(config);
        let sessions = Arc::new(SessionManager::new(backend));
        let store = Arc::new(UploadStore::new(Arc::clone(&config), sessions));
        let pipeline = MergePipeline::new(Arc::clone(&store), stamper, config.unknown_ids);

        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    /// Reuse the provided session when it is live, otherwise start a new one
    pub async fn get_or_create_session(&self, provided: Option<&str>) -> SessionId {
        self.store.sessions().get_or_create(provided).await
    }

    pub async fn add_files(&self, id: &SessionId, files: Vec<RawFile>) -> Result<Vec<UploadedFile>> {
        self.store.add_files(id, files).await
    }

    pub async fn list_files(&self, id: &SessionId) -> Result<Vec<UploadedFile>> {
        self.store.list_files(id).await
    }

    /// First page of an uploaded file as a one-page PDF
    pub async fn preview(&self, id: &SessionId, file_id: u32) -> Result<Vec<u8>> {
        self.store.preview(id, file_id).await
    }

    /// Merge and discard the session
    pub async fn merge(&self, id: &SessionId, request: &MergeRequest) -> Result<MergedDocument> {
        self.pipeline.merge(id, request).await
    }

    /// Discard a session and its files
    pub async fn clear(&self, id: &SessionId) {
        self.store.clear(id).await;
    }

    pub async fn get_preferences(&self, id: &SessionId) -> Preferences {
        self.store.sessions().get_preferences(id).await
    }

    pub async fn set_preferences(&self, provided: Option<&str>, preferences: Preferences) -> SessionId {
        self.store.sessions().set_preferences(provided, preferences).await
    }

    /// Clear sessions idle past the configured TTL; a TTL of zero disables it
    pub async fn cleanup_expired_sessions(&self) -> usize {
        match self.config.session_ttl() {
            Some(ttl) => self.store.cleanup_expired(ttl).await,
            None => 0,
        }
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.store.sessions().len().await
    }

    pub fn config(&self) -> &MergerConfig {
        &self.config
    }

    pub fn stamper_name(&self) -> &'static str {
        self.pipeline.stamper().name()
    }

    /// Whether merges requesting page numbers can actually get them
    pub fn page_numbers_available(&self) -> bool {
        self.pipeline.stamper().is_available()
    }
}
