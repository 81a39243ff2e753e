use thiserror::Error;

/// Unified error type for pdf-merger-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Upload and session operations (validation, lookup, size limits)
/// - PDF operations (opening, extracting, merging, saving)
/// - Page numbering (stamping, unavailable capability)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Request Errors
    // ==========================================================================
    /// The request carried nothing usable (no files, wrong extensions, empty merge set)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown session or file id
    #[error("not found: {0}")]
    NotFound(String),

    /// Aggregate upload size exceeded the configured cap
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    // ==========================================================================
    // Pipeline Errors
    // ==========================================================================
    /// A specific stored file could not be parsed or extracted
    #[error("failed to render PDF: {0}")]
    Render(String),

    /// Merging the resolved files failed
    #[error("failed to merge PDFs: {0}")]
    Merge(String),

    /// No working page-numbering implementation was selected
    #[error("page numbering is not available")]
    PageNumbersUnavailable,

    /// Stamping page numbers onto the merged document failed
    #[error("failed to add page numbers: {0}")]
    PageNumbers(String),

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap any PDF adapter failure as a render failure for the named file.
    pub(crate) fn render_for(name: &str, err: &Self) -> Self {
        Self::Render(format!("{name}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
