//! Concatenates two PDFs into one document.
//!
//! The pages of the first input come first, followed by the pages of the
//! second, each in its original order. Object numbers of the second input
//! are shifted past the first so the two object graphs never collide.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::error::{DocumentError, PdfInput};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

pub fn combine(first: &[u8], second: &[u8]) -> Result<Vec<u8>, DocumentError> {
    let _span = tracing::info_span!("document.combine").entered();

    let inputs = [
        (PdfInput::RenderedContract, load(first, PdfInput::RenderedContract)?),
        (PdfInput::ScopeOfWork, load(second, PdfInput::ScopeOfWork)?),
    ];

    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Dictionary)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for (input, mut doc) in inputs {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if page_ids.is_empty() {
            return Err(malformed(input, "document has no pages"));
        }

        for page_id in page_ids {
            let page = doc
                .get_dictionary(page_id)
                .map_err(|e| malformed(input, e))?;
            pages.push((page_id, flatten_page(&doc, page)));
        }
        objects.extend(doc.objects);
    }

    let mut out = Document::with_version("1.5");
    for (id, object) in objects {
        match type_of(&object) {
            Some(b"Catalog") | Some(b"Pages") | Some(b"Page") | Some(b"Outlines")
            | Some(b"Outline") => continue,
            _ => {
                out.objects.insert(id, object);
            }
        }
    }
    out.max_id = next_id.saturating_sub(1);

    let pages_id = out.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());
    for (page_id, mut page) in pages {
        page.set("Parent", pages_id);
        out.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    let mut page_tree = Dictionary::new();
    page_tree.set("Type", "Pages");
    page_tree.set("Count", kids.len() as i64);
    page_tree.set("Kids", kids);
    out.objects.insert(pages_id, Object::Dictionary(page_tree));

    let mut catalog = Dictionary::new();
    catalog.set("Type", "Catalog");
    catalog.set("Pages", pages_id);
    let catalog_id = out.add_object(catalog);
    out.trailer.set("Root", catalog_id);

    out.renumber_objects();
    out.compress();

    let mut bytes = Vec::new();
    out.save_to(&mut bytes)
        .map_err(|e| DocumentError::Render(super::error::RenderError::Pdf(e.to_string())))?;

    tracing::debug!(pages = out.get_pages().len(), bytes = bytes.len(), "Combined PDF");
    Ok(bytes)
}

/// Number of pages in a PDF held in memory.
pub fn page_count(bytes: &[u8], input: PdfInput) -> Result<usize, DocumentError> {
    Ok(load(bytes, input)?.get_pages().len())
}

fn load(bytes: &[u8], input: PdfInput) -> Result<Document, DocumentError> {
    if bytes.is_empty() {
        return Err(malformed(input, "empty file"));
    }
    Document::load_mem(bytes).map_err(|e| malformed(input, e))
}

fn malformed(input: PdfInput, reason: impl ToString) -> DocumentError {
    DocumentError::MalformedPdf {
        input,
        reason: reason.to_string(),
    }
}

fn type_of(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Copies a page dictionary with inherited attributes written onto it, so it
/// stays complete once detached from its original page tree.
fn flatten_page(doc: &Document, page: &Dictionary) -> Dictionary {
    let mut flat = page.clone();
    for key in INHERITABLE {
        if flat.has(key) {
            continue;
        }
        if let Some(value) = inherited(doc, page, key) {
            flat.set(key, value);
        }
    }
    flat.remove(b"Parent");
    flat
}

fn inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(id) = parent {
        if depth >= MAX_TREE_DEPTH {
            return None;
        }
        let node = doc.get_dictionary(id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }
    None
}
