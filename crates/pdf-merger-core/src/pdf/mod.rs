mod assemble;
mod document;
mod page_index;
pub(crate) mod overlay;

#[cfg(test)]
pub(crate) mod testing;

pub use assemble::{extract_page, merge_documents};
pub use document::PdfDocument;
pub use page_index::PageIndex;
