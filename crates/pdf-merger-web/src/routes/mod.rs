//! HTTP route handlers for the PDF merger web application.
//!
//! The index page is HTML (Askama); everything under `/api` is JSON except
//! preview and merge, which return PDF bytes.

mod files;
mod merge;
mod pages;
mod preferences;
mod preview;
mod session;
mod upload;

pub use files::list_files;
pub use merge::{PAGE_NUMBERS_HEADER, merge_files};
pub use pages::index;
pub use preferences::{get_preferences, set_preferences};
pub use preview::preview_file;
pub use session::clear_session;
pub use upload::upload_files;
