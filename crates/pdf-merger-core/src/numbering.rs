//! Page-number stamping.
//!
//! Two implementations sit behind [`PageNumberStamper`]: [`HelveticaStamper`]
//! draws `Page i of n` on every page, and [`UnavailableStamper`] refuses with
//! [`Error::PageNumbersUnavailable`]. Which one a process uses is decided once,
//! at startup, by [`create_stamper`].

use std::sync::Arc;

use lopdf::Document;
use lopdf::content::{Content, Operation};
use lopdf::Object;
use tracing::debug;

use crate::config::PageNumberConfig;
use crate::error::{Error, Result};
use crate::pdf::overlay;

/// Resource name the stamp font is registered under on each page.
const FONT_RESOURCE: &str = "FPageNo";

/// Capability to stamp page numbers onto a whole document.
pub trait PageNumberStamper: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Whether `stamp` can succeed at all
    fn is_available(&self) -> bool {
        true
    }

    /// Return a copy of `pdf` with every page numbered, pages in original order.
    fn stamp(&self, pdf: &[u8]) -> Result<Vec<u8>>;
}

/// Select the stamper for this process from configuration.
pub fn create_stamper(config: &PageNumberConfig) -> Arc<dyn PageNumberStamper> {
    if config.enabled {
        Arc::new(HelveticaStamper::new(config))
    } else {
        Arc::new(UnavailableStamper)
    }
}

/// Text drawn on page `index` (0-based) of `total`.
pub fn page_label(index: usize, total: usize) -> String {
    format!("Page {} of {}", index + 1, total)
}

/// Stamps labels in base-14 Helvetica, centred near the bottom of each page.
///
/// "Bottom" is the edge shown at the bottom once the viewer applies the
/// page's `/Rotate`, so rotated scans get upright labels.
#[derive(Debug, Clone)]
pub struct HelveticaStamper {
    font_size: f32,
    bottom_margin: f32,
}

impl HelveticaStamper {
    pub const fn new(config: &PageNumberConfig) -> Self {
        Self {
            font_size: config.font_size,
            bottom_margin: config.bottom_margin,
        }
    }

    /// Text matrix for a label `text_width` wide on a page with the given
    /// MediaBox and rotation.
    fn label_matrix(&self, [llx, lly, urx, ury]: [f32; 4], rotation: i64, text_width: f32) -> [f32; 6] {
        let margin = self.bottom_margin;
        match rotation {
            90 => [0.0, 1.0, -1.0, 0.0, urx - margin, (ury - lly - text_width).mul_add(0.5, lly)],
            180 => [-1.0, 0.0, 0.0, -1.0, (urx - llx + text_width).mul_add(0.5, llx), ury - margin],
            270 => [0.0, -1.0, 1.0, 0.0, llx + margin, (ury - lly + text_width).mul_add(0.5, lly)],
            _ => [1.0, 0.0, 0.0, 1.0, (urx - llx - text_width).mul_add(0.5, llx), lly + margin],
        }
    }

    fn label_content(&self, label: &str, matrix: [f32; 6]) -> Result<Vec<u8>> {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("g", vec![Object::Integer(0)]),
                Operation::new("Tf", vec![FONT_RESOURCE.into(), Object::Real(self.font_size)]),
                Operation::new("Tm", matrix.into_iter().map(Object::Real).collect()),
                Operation::new("Tj", vec![Object::string_literal(label)]),
                Operation::new("ET", vec![]),
            ],
        };

        content
            .encode()
            .map_err(|e| Error::PageNumbers(format!("Failed to encode label: {e}")))
    }
}

impl Default for HelveticaStamper {
    fn default() -> Self {
        Self::new(&PageNumberConfig::default())
    }
}

impl PageNumberStamper for HelveticaStamper {
    fn name(&self) -> &'static str {
        "helvetica"
    }

    fn stamp(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let mut doc = Document::load_mem(pdf)
            .map_err(|e| Error::PageNumbers(format!("Failed to load PDF: {e}")))?;

        let pages: Vec<_> = doc.get_pages().into_values().collect();
        let total = pages.len();
        if total == 0 {
            return Err(Error::PageNumbers("document has no pages".to_string()));
        }

        let font_id = overlay::add_standard_font(&mut doc, "Helvetica");

        for (index, page_id) in pages.into_iter().enumerate() {
            let label = page_label(index, total);
            let matrix = self.label_matrix(
                overlay::media_box(&doc, page_id),
                overlay::rotation(&doc, page_id),
                helvetica_width(&label, self.font_size),
            );

            overlay::register_font(&mut doc, page_id, FONT_RESOURCE, font_id)?;
            overlay::overlay_page_content(&mut doc, page_id, &self.label_content(&label, matrix)?)?;
        }

        debug!("Stamped page numbers on {} pages", total);

        let mut output = Vec::new();
        doc.save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save numbered PDF: {e}")))?;

        Ok(output)
    }
}

/// Used when page numbering is switched off; every call fails explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStamper;

impl PageNumberStamper for UnavailableStamper {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn stamp(&self, _pdf: &[u8]) -> Result<Vec<u8>> {
        Err(Error::PageNumbersUnavailable)
    }
}

/// Approximate rendered width of `text` in Helvetica at `size` points.
///
/// Exact AFM widths for the characters labels use; anything else is treated
/// as a digit-width glyph.
fn helvetica_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| match c {
            ' ' | 'f' => 278,
            'P' => 667,
            _ => 556,
        })
        .sum();

    #[allow(clippy::cast_precision_loss)]
    let units = units as f32;
    units * size / 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::testing::{page_contents, sample_pdf};

    #[test]
    fn test_page_label() {
        assert_eq!(page_label(0, 3), "Page 1 of 3");
        assert_eq!(page_label(9, 10), "Page 10 of 10");
    }

    #[test]
    fn test_helvetica_width() {
        // P a g e _ 1 _ o f _ 3
        let expected = (667 + 556 * 3 + 278 + 556 + 278 + 556 + 278 + 278 + 556) as f32 * 9.0 / 1000.0;
        assert!((helvetica_width("Page 1 of 3", 9.0) - expected).abs() < 0.001);
    }

    #[test]
    fn test_stamp_numbers_every_page() {
        let stamped = HelveticaStamper::default().stamp(&sample_pdf(3, "doc")).unwrap();
        let contents = page_contents(&stamped);

        assert_eq!(contents.len(), 3);
        for (i, content) in contents.iter().enumerate() {
            assert!(content.contains(&format!("doc-p{}", i + 1)));
            assert!(content.contains(&format!("(Page {} of 3) Tj", i + 1)));
            assert!(content.contains("/FPageNo "));
        }
    }

    /// Operands of the label's `Tm` on the first page.
    fn stamped_matrix(pdf: &[u8]) -> Vec<f32> {
        let doc = Document::load_mem(pdf).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        content
            .operations
            .iter()
            .find(|op| op.operator == "Tm")
            .unwrap()
            .operands
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn test_label_sits_on_visual_bottom_of_rotated_pages() {
        let width = helvetica_width("Page 1 of 1", 9.0);
        // Letter page, 20pt margin
        let cases = [
            (0, [1.0, 0.0, 0.0, 1.0, (612.0 - width) / 2.0, 20.0]),
            (90, [0.0, 1.0, -1.0, 0.0, 592.0, (792.0 - width) / 2.0]),
            (180, [-1.0, 0.0, 0.0, -1.0, (612.0 + width) / 2.0, 772.0]),
            (270, [0.0, -1.0, 1.0, 0.0, 20.0, (792.0 + width) / 2.0]),
        ];

        for (rotate, expected) in cases {
            let mut doc = Document::load_mem(&sample_pdf(1, "doc")).unwrap();
            let page_id = *doc.get_pages().values().next().unwrap();
            doc.get_object_mut(page_id)
                .and_then(Object::as_dict_mut)
                .unwrap()
                .set("Rotate", Object::Integer(rotate));
            let mut input = Vec::new();
            doc.save_to(&mut input).unwrap();

            let matrix = stamped_matrix(&HelveticaStamper::default().stamp(&input).unwrap());
            assert_eq!(matrix.len(), 6);
            for (actual, wanted) in matrix.iter().zip(expected) {
                assert!((actual - wanted).abs() < 0.01, "rotate {rotate}: {matrix:?}");
            }
        }
    }

    #[test]
    fn test_stamp_rejects_garbage() {
        let result = HelveticaStamper::default().stamp(b"not a pdf");
        assert!(matches!(result, Err(Error::PageNumbers(_))));
    }

    #[test]
    fn test_unavailable_stamper_reports_clearly() {
        let stamper = UnavailableStamper;
        assert!(!stamper.is_available());
        assert!(matches!(
            stamper.stamp(&sample_pdf(1, "doc")),
            Err(Error::PageNumbersUnavailable)
        ));
    }

    #[test]
    fn test_create_stamper_follows_config() {
        let enabled = create_stamper(&PageNumberConfig::default());
        assert_eq!(enabled.name(), "helvetica");

        let disabled = create_stamper(&PageNumberConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(!disabled.is_available());
    }
}
