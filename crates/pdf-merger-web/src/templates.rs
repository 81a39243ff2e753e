//! Askama templates.
//!
//! The index page is the whole UI; `static/js/app.js` drives it through the
//! JSON API.

use askama::Template;
use askama_web::WebTemplate;
use pdf_merger_core::PdfMerger;

/// Landing page with upload form, file list and merge controls.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub max_upload_mb: usize,
    /// Value for the file input's `accept` attribute, e.g. `.pdf`
    pub accept: String,
    pub page_numbers_available: bool,
}

impl IndexTemplate {
    pub fn new(merger: &PdfMerger) -> Self {
        let config = merger.config();
        Self {
            max_upload_mb: config.max_upload_bytes / (1024 * 1024),
            accept: config
                .allowed_extensions
                .iter()
                .map(|ext| format!(".{}", ext.trim_start_matches('.')))
                .collect::<Vec<_>>()
                .join(","),
            page_numbers_available: merger.page_numbers_available(),
        }
    }
}
