//! Shared lopdf helpers: load, save, inherited page attributes, text objects.

use crate::error::DocError;
use crate::ops::input;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// US Letter, used when a page has no resolvable MediaBox.
pub const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page trees are shallow in practice; this stops a cyclic `/Parent` chain.
const MAX_TREE_DEPTH: usize = 64;

/// Validate and parse a PDF, mapping parse failures to [`DocError::CorruptPdf`].
pub fn load(path: &Path) -> Result<Document, DocError> {
    input::check_pdf(path)?;
    let doc = Document::load(path).map_err(|e| DocError::CorruptPdf {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    debug!("Loaded '{}': {} pages", path.display(), doc.get_pages().len());
    Ok(doc)
}

/// Serialise `doc` and write it to `output`, creating parent directories.
pub fn save(doc: &mut Document, operation: &'static str, output: &Path) -> Result<(), DocError> {
    input::ensure_parent(output)?;
    let mut buf = Vec::new();
    doc.save_to(&mut buf)
        .map_err(|e| DocError::conversion(operation, e))?;
    std::fs::write(output, &buf).map_err(|e| DocError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: e,
    })?;
    debug!("Wrote {} bytes to '{}'", buf.len(), output.display());
    Ok(())
}

/// Look up `key` on the page, walking up `/Parent` links until found.
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Copy every inherited attribute onto the page dictionaries themselves.
///
/// After this, each page is self-contained and the intermediate `/Pages`
/// nodes can be discarded without losing resources or geometry.
pub fn materialize_inherited(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        for key in INHERITABLE {
            let present = doc
                .get_dictionary(page_id)
                .map(|d| d.has(key))
                .unwrap_or(true);
            if present {
                continue;
            }
            if let Some(value) = inherited_attribute(doc, page_id, key) {
                if let Ok(page) = doc.get_dictionary_mut(page_id) {
                    page.set(key.to_vec(), value);
                }
            }
        }
    }
}

/// The page's MediaBox as `[llx, lly, urx, ury]`, or [`LETTER`] if unreadable.
pub fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(value) = inherited_attribute(doc, page_id, b"MediaBox") else {
        return LETTER;
    };
    let value = match value {
        Object::Reference(id) => match doc.get_object(id) {
            Ok(obj) => obj.clone(),
            Err(_) => return LETTER,
        },
        other => other,
    };
    let Ok(items) = value.as_array() else {
        return LETTER;
    };
    if items.len() != 4 {
        return LETTER;
    }
    let mut rect = [0.0f32; 4];
    for (slot, item) in rect.iter_mut().zip(items) {
        match item.as_float() {
            Ok(v) => *slot = v,
            Err(_) => return LETTER,
        }
    }
    rect
}

/// Resolve `obj` to a dictionary, following one level of indirection.
pub fn resolve_dictionary(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Dictionary(d) => Some(d.clone()),
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        _ => None,
    }
}

/// Add a standard Type1 Helvetica font object (bold or regular) with WinAnsi encoding.
pub fn add_helvetica(doc: &mut Document, bold: bool) -> ObjectId {
    let base = if bold { "Helvetica-Bold" } else { "Helvetica" };
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

/// A literal string object in the single-byte encoding the standard fonts use.
///
/// Characters outside Latin-1 have no glyph in WinAnsi and become `?`.
pub fn text_object(text: &str) -> Object {
    let bytes: Vec<u8> = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

/// Page count of the PDF at `path`.
pub fn page_count(path: &Path) -> Result<usize, DocError> {
    Ok(load(path)?.get_pages().len())
}

/// Document facts shown by `pdfdesk inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfInfo {
    pub page_count: usize,
    pub pdf_version: String,
    pub is_encrypted: bool,
    /// Whether direct extraction finds any text; `false` means PDF→Word needs OCR.
    pub has_text_layer: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
}

/// Read page count, version, the Info dictionary and whether there is a text layer.
pub fn inspect(path: &Path) -> Result<PdfInfo, DocError> {
    let mut doc = load(path)?;
    materialize_inherited(&mut doc);
    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    let has_text_layer = !numbers.is_empty()
        && doc
            .extract_text(&numbers)
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
    let info = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|obj| resolve_dictionary(&doc, obj));
    let field = |key: &[u8]| info.as_ref().and_then(|d| info_string(&doc, d, key));

    Ok(PdfInfo {
        page_count: numbers.len(),
        pdf_version: doc.version.clone(),
        is_encrypted: doc.is_encrypted(),
        has_text_layer,
        title: field(b"Title"),
        author: field(b"Author"),
        producer: field(b"Producer"),
    })
}

/// A text entry of the Info dictionary; UTF-16BE when it carries a BOM, Latin-1 otherwise.
fn info_string(doc: &Document, info: &Dictionary, key: &[u8]) -> Option<String> {
    let obj = match info.get(key).ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let Object::String(bytes, _) = obj else {
        return None;
    };
    let text = match bytes.strip_prefix(&[0xFE, 0xFF]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| char::from(b)).collect(),
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}
