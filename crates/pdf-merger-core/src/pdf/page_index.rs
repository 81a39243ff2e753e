//! Page index newtype for safe conversion between usize and lopdf page numbers.
//!
//! Callers address pages 0-based; lopdf's page map is keyed by 1-based `u32`
//! page numbers. This wrapper keeps the conversion in one place.

use crate::error::Error;

/// A validated 0-based page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(u32);

impl PageIndex {
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the 1-indexed page number used as the key of `Document::get_pages`.
    #[must_use]
    pub const fn as_lopdf_page_number(self) -> u32 {
        self.0 + 1
    }

    /// Try to create a PageIndex from a usize page number.
    ///
    /// Returns an error if the page number exceeds the total page count or
    /// cannot be represented as a lopdf page number.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        let invalid = || Error::PdfInvalidPage {
            page: page_num,
            total: total_pages,
        };

        if page_num >= total_pages {
            return Err(invalid());
        }

        let index = u32::try_from(page_num).map_err(|_| invalid())?;
        index.checked_add(1).ok_or_else(invalid)?;

        Ok(Self(index))
    }
}
