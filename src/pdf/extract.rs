//! Page copying with lopdf
//!
//! A derived document keeps the source's objects and gets a flat page tree
//! whose kids are exactly the selected pages, in selection order. Attributes
//! a page inherits from intermediate page-tree nodes are copied onto the page
//! first, since those nodes are dropped.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use lopdf::{Document, Object, ObjectId};

use super::error::{PdfError, PdfResult};

/// Keys a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against malformed, cyclic page trees
const MAX_TREE_DEPTH: usize = 64;

/// Document-copy capability
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Number of pages in the document
    async fn page_count(&self, data: Arc<[u8]>) -> PdfResult<usize>;

    /// New document containing only the pages at `indices` (0-based), in that order
    async fn extract_pages(&self, data: Arc<[u8]>, indices: Vec<usize>) -> PdfResult<Vec<u8>>;
}

/// `PageExtractor` backed by lopdf
#[derive(Debug, Default, Clone)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PageExtractor for LopdfExtractor {
    async fn page_count(&self, data: Arc<[u8]>) -> PdfResult<usize> {
        tokio::task::spawn_blocking(move || {
            let doc = load(&data)?;
            Ok(doc.get_pages().len())
        })
        .await?
    }

    async fn extract_pages(&self, data: Arc<[u8]>, indices: Vec<usize>) -> PdfResult<Vec<u8>> {
        tokio::task::spawn_blocking(move || extract(&data, &indices)).await?
    }
}

fn load(data: &[u8]) -> PdfResult<Document> {
    Document::load_mem(data).map_err(|e| PdfError::InvalidDocument(e.to_string()))
}

fn extract(data: &[u8], indices: &[usize]) -> PdfResult<Vec<u8>> {
    let mut doc = load(data)?;
    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();

    let pages_root = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::InvalidDocument(format!("missing page tree: {}", e)))?;

    let mut kids = Vec::with_capacity(indices.len());
    let mut used = HashSet::new();

    for &index in indices {
        let page_id = *pages.get(index).ok_or(PdfError::PageOutOfRange {
            index,
            page_count: pages.len(),
        })?;

        let inherited = inherited_attributes(&doc, page_id);

        // A page object can have only one parent, so repeats get their own copy
        let target_id = if used.insert(page_id) {
            page_id
        } else {
            let copy = doc
                .get_object(page_id)
                .map_err(|e| PdfError::WriteError(e.to_string()))?
                .clone();
            doc.add_object(copy)
        };

        let page = doc
            .get_dictionary_mut(target_id)
            .map_err(|e| PdfError::WriteError(e.to_string()))?;
        for (key, value) in inherited {
            page.set(key, value);
        }
        page.set("Parent", Object::Reference(pages_root));

        kids.push(Object::Reference(target_id));
    }

    let count = kids.len() as i64;
    let root = doc
        .get_dictionary_mut(pages_root)
        .map_err(|e| PdfError::WriteError(e.to_string()))?;
    root.set("Kids", Object::Array(kids));
    root.set("Count", Object::Integer(count));
    for key in INHERITABLE_KEYS {
        root.remove(key);
    }

    doc.prune_objects();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| PdfError::WriteError(e.to_string()))?;
    Ok(out)
}

/// Inheritable attributes the page does not set itself, nearest ancestor first
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let mut found: Vec<(Vec<u8>, Object)> = Vec::new();
    let Ok(page) = doc.get_dictionary(page_id) else {
        return found;
    };

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;

    while let Some(node_id) = parent {
        depth += 1;
        if depth > MAX_TREE_DEPTH {
            break;
        }
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };

        for key in INHERITABLE_KEYS {
            if page.has(key) || found.iter().any(|(k, _)| k.as_slice() == key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                found.push((key.to_vec(), value.clone()));
            }
        }

        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    found
}
