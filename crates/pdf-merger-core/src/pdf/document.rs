use lopdf::Document;

use crate::error::{Error, Result};

/// A parsed PDF kept alongside its raw bytes
#[derive(Clone)]
pub struct PdfDocument {
    bytes: Vec<u8>,
    page_count: usize,
    /// PDF header version, e.g. "1.7"
    version: String,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        let doc = Document::load_mem(&bytes)
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc.get_pages().len();

        Ok(Self {
            bytes,
            page_count,
            version: doc.version.clone(),
        })
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("page_count", &self.page_count)
            .field("version", &self.version)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
