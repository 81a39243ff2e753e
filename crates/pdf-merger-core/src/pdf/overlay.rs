//! Drawing primitives for content overlaid on existing pages.
//!
//! # Coordinate System
//!
//! PDF uses a **bottom-left origin**: (0, 0) is the lower-left corner of the
//! page's MediaBox, X increases to the right and Y increases upward. Positions
//! computed here are offsets from the MediaBox origin, which is not always
//! (0, 0).
//!
//! # Layering
//!
//! The original content is bracketed with `q`/`Q` and the overlay is appended
//! after it, so the overlay paints on top and starts from the default
//! graphics state whatever the original content leaves behind.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Error, Result};

/// US Letter, used when no MediaBox can be found.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Guard against malformed page trees with parent cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Look up a page attribute, walking up the page tree for inherited values
/// and resolving a top-level reference.
fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node_id = page_id;

    for _ in 0..MAX_TREE_DEPTH {
        let dict = doc.get_object(node_id).and_then(Object::as_dict).ok()?;

        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok().cloned(),
                other => Some(other.clone()),
            };
        }

        node_id = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    }

    None
}

/// Get the page's MediaBox as `[llx, lly, urx, ury]`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    if let Some(Object::Array(arr)) = inherited_attribute(doc, page_id, b"MediaBox")
        && arr.len() == 4
    {
        let values: Vec<f32> = arr
            .iter()
            .filter_map(|o| match o {
                #[allow(clippy::cast_precision_loss)]
                Object::Integer(i) => Some(*i as f32),
                Object::Real(r) => Some(*r),
                _ => None,
            })
            .collect();

        if values.len() == 4 {
            return [values[0], values[1], values[2], values[3]];
        }
    }

    DEFAULT_MEDIA_BOX
}

/// The page's `/Rotate` normalized to 0, 90, 180 or 270 degrees clockwise.
pub(crate) fn rotation(doc: &Document, page_id: ObjectId) -> i64 {
    match inherited_attribute(doc, page_id, b"Rotate") {
        Some(Object::Integer(degrees)) => degrees.rem_euclid(360) / 90 * 90,
        _ => 0,
    }
}

/// Add a standard (non-embedded) Type1 font object to the document.
pub(crate) fn add_standard_font(doc: &mut Document, base_font: &str) -> ObjectId {
    doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
        ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
    ]))
}

/// Make `font_id` available to the page's content under `resource_name`.
///
/// The page gets its own inline Resources dictionary (a copy of whatever it
/// had or inherited), so resource dictionaries shared with other pages are
/// left untouched.
pub(crate) fn register_font(
    doc: &mut Document,
    page_id: ObjectId,
    resource_name: &str,
    font_id: ObjectId,
) -> Result<()> {
    let mut resources = match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    };

    let mut fonts = match resources.get(b"Font") {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        Ok(Object::Reference(id)) => doc
            .get_object(*id)
            .and_then(Object::as_dict)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };
    fonts.set(resource_name, Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(dict) = page {
        dict.set("Resources", Object::Dictionary(resources));
        Ok(())
    } else {
        Err(Error::Lopdf(format!("Page {page_id:?} is not a dictionary")))
    }
}

/// Paint `overlay` (an encoded content stream) on top of the page.
pub(crate) fn overlay_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    overlay: &[u8],
) -> Result<()> {
    let existing: Vec<Object> = {
        let page = doc
            .get_object(page_id)
            .and_then(Object::as_dict)
            .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                // An indirect array of streams
                Ok(Object::Array(arr)) => arr.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(arr)) => arr.clone(),
            _ => Vec::new(),
        }
    };

    let save_id = doc.add_object(Object::Stream(Stream::new(
        Dictionary::new(),
        b"q\n".to_vec(),
    )));

    let mut tail = b"Q\n".to_vec();
    tail.extend_from_slice(overlay);
    let overlay_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), tail)));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(save_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to get page: {e}")))?;

    if let Object::Dictionary(dict) = page {
        dict.set("Contents", Object::Array(contents));
    }

    Ok(())
}
