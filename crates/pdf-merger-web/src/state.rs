use anyhow::{Context, Result};
use pdf_merger_core::{MergerConfig, PdfMerger};
use tracing::info;

/// Global application state
pub struct AppState {
    pub merger: PdfMerger,
}

impl AppState {
    pub fn new(config: MergerConfig) -> Result<Self> {
        let merger = PdfMerger::new(config).context("Failed to initialize merger")?;
        Ok(Self { merger })
    }

    /// Upload cap applied to request bodies, with room for multipart framing
    pub fn body_limit(&self) -> usize {
        self.merger.config().max_upload_bytes.saturating_add(64 * 1024)
    }

    /// Clear sessions that have been idle past the configured TTL.
    pub async fn cleanup_old_sessions(&self) {
        let removed = self.merger.cleanup_expired_sessions().await;
        if removed > 0 {
            info!(
                "Cleaned up {} expired sessions ({} active)",
                removed,
                self.merger.session_count().await
            );
        }
    }
}
