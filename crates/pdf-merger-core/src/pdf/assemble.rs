//! Build new documents out of pages taken from existing ones.
//!
//! Merging and single-page extraction share one path: every source is loaded,
//! its objects are renumbered past the ids already used, the selected pages
//! are copied into a fresh page tree in order, and unreachable objects are
//! pruned before saving.

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use super::page_index::PageIndex;
use crate::error::{Error, Result};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed page trees with parent cycles.
const MAX_TREE_DEPTH: usize = 64;

/// Accumulates pages from several sources into one output document.
struct Assembler {
    document: Document,
    /// Next free object number in `document`
    next_id: u32,
    /// Page object ids of the output, in output order
    pages: Vec<ObjectId>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            document: Document::with_version("1.5"),
            next_id: 1,
            pages: Vec::new(),
        }
    }

    /// Append pages of `source`. `selection` holds 1-based page numbers; `None`
    /// takes every page.
    fn append(&mut self, mut source: Document, selection: Option<&[u32]>) -> Result<()> {
        source.renumber_objects_with(self.next_id);
        self.next_id = source.max_id + 1;

        let source_pages = source.get_pages();
        let chosen: Vec<ObjectId> = match selection {
            None => source_pages.values().copied().collect(),
            Some(numbers) => numbers
                .iter()
                .map(|number| {
                    source_pages.get(number).copied().ok_or(Error::PdfInvalidPage {
                        page: *number as usize,
                        total: source_pages.len(),
                    })
                })
                .collect::<Result<_>>()?,
        };

        // Flatten before the page tree nodes are discarded below.
        let mut flattened = Vec::with_capacity(chosen.len());
        for page_id in chosen {
            flattened.push((page_id, flatten_page(&source, page_id)?));
        }

        for (object_id, object) in source.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.document.objects.insert(object_id, object);
                }
            }
        }

        for (page_id, dict) in flattened {
            self.document.objects.insert(page_id, Object::Dictionary(dict));
            self.pages.push(page_id);
        }

        Ok(())
    }

    /// Write the page tree and catalog, then serialize.
    fn finish(self) -> Result<Vec<u8>> {
        let Self {
            mut document,
            next_id,
            pages,
        } = self;

        if pages.is_empty() {
            return Err(Error::Lopdf("No pages to assemble".to_string()));
        }

        document.max_id = next_id - 1;
        let pages_id = document.new_object_id();

        for page_id in &pages {
            if let Some(Object::Dictionary(dict)) = document.objects.get_mut(page_id) {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let kids: Vec<Object> = pages.iter().map(|&id| Object::Reference(id)).collect();
        let count = i64::try_from(pages.len())
            .map_err(|_| Error::Lopdf(format!("Too many pages: {}", pages.len())))?;

        document.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );

        let catalog_id = document.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        document.trailer.set("Root", Object::Reference(catalog_id));

        let pruned = document.prune_objects();
        debug!("Assembled {} pages, pruned {} objects", pages.len(), pruned.len());

        document.renumber_objects();
        document.compress();

        let mut output = Vec::new();
        document
            .save_to(&mut output)
            .map_err(|e| Error::PdfSave(format!("Failed to save assembled PDF: {e}")))?;

        Ok(output)
    }
}

/// Clone a page dictionary with inherited attributes copied in and the
/// `Parent` link removed.
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut dict = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| Error::Lopdf(format!("Failed to get page object: {e}")))?
        .clone();

    let mut parent = dict.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(parent_id) = parent {
        if depth >= MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
            break;
        };

        for key in INHERITABLE_KEYS {
            if !dict.has(key)
                && let Ok(value) = node.get(key)
            {
                dict.set(key.to_vec(), value.clone());
            }
        }

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    dict.remove(b"Parent");
    Ok(dict)
}

fn load(bytes: &[u8], position: usize) -> Result<Document> {
    Document::load_mem(bytes)
        .map_err(|e| Error::PdfOpen(format!("Failed to load document {}: {}", position + 1, e)))
}

/// Merge several PDFs into one, keeping the given document order and each
/// document's own page order.
pub fn merge_documents(documents: &[Vec<u8>]) -> Result<Vec<u8>> {
    match documents {
        [] => Err(Error::Merge("No documents to merge".to_string())),
        [only] => {
            // Still parse it so a corrupt input fails here rather than downstream.
            load(only, 0)?;
            Ok(only.clone())
        }
        _ => {
            let mut assembler = Assembler::new();
            for (position, bytes) in documents.iter().enumerate() {
                assembler.append(load(bytes, position)?, None)?;
            }
            assembler.finish()
        }
    }
}

/// Copy a single page (0-based) into a standalone one-page document.
pub fn extract_page(pdf: &[u8], page_num: usize) -> Result<Vec<u8>> {
    let source = load(pdf, 0)?;
    let index = PageIndex::try_from_page_num(page_num, source.get_pages().len())?;

    let mut assembler = Assembler::new();
    assembler.append(source, Some(&[index.as_lopdf_page_number()]))?;
    assembler.finish()
}
