//! Signature stamping.
//!
//! The stamp is a single line of text, `Signed by: <signer>`, drawn in
//! Helvetica. Two placements are supported (see [`SignStrategy`]):
//!
//! * **Overlay**: two new content streams are wrapped around page 1's
//!   existing streams, `q` before and `Q` + stamp after, so the page's own
//!   graphics state cannot leak into the stamp. The page gets a private copy of
//!   its resource dictionary with one extra font entry. Existing stream
//!   objects are never rewritten.
//! * **AppendPage**: a new last page, sized like page 1, carries only the stamp.
//!
//! If the overlay cannot be applied (no pages, unreadable page dictionary) the
//! original bytes are written unchanged and the outcome says the stamp was
//! skipped.

use crate::config::{SignOptions, SignStrategy};
use crate::error::DocError;
use crate::ops::{input, pdf};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where the stamp ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "placement", rename_all = "snake_case")]
pub enum StampPlacement {
    /// Drawn on top of page 1.
    FirstPage,
    /// Drawn on an appended trailing page.
    TrailingPage,
    /// Not drawn; the output is a copy of the input.
    Skipped { reason: String },
}

/// Result of [`sign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignOutcome {
    pub output: PathBuf,
    pub placement: StampPlacement,
}

/// Text of the stamp for `signer`.
pub fn stamp_label(signer: &str) -> String {
    let signer = signer.trim();
    if signer.is_empty() {
        "Signed by: Signed User".to_string()
    } else {
        format!("Signed by: {signer}")
    }
}

/// Stamp `path` with a signature line for `signer` and write the result to `output`.
pub fn sign(
    path: &Path,
    output: &Path,
    signer: &str,
    options: &SignOptions,
) -> Result<SignOutcome, DocError> {
    input::check_pdf(path)?;
    let original = Document::load(path).map_err(|e| DocError::conversion("sign", e))?;
    let label = stamp_label(signer);

    let placement = match options.strategy {
        SignStrategy::Overlay => {
            let mut stamped = original.clone();
            match overlay_first_page(&mut stamped, &label, options) {
                Ok(()) => {
                    pdf::save(&mut stamped, "sign", output)?;
                    StampPlacement::FirstPage
                }
                Err(reason) => {
                    warn!(
                        "Signature overlay skipped for '{}': {}",
                        path.display(),
                        reason
                    );
                    let mut unchanged = original;
                    pdf::save(&mut unchanged, "sign", output)?;
                    StampPlacement::Skipped { reason }
                }
            }
        }
        SignStrategy::AppendPage => {
            let mut doc = original;
            append_signature_page(&mut doc, &label, options)
                .map_err(|detail| DocError::conversion("sign", detail))?;
            pdf::save(&mut doc, "sign", output)?;
            StampPlacement::TrailingPage
        }
    };

    info!(
        "Signed '{}' as {:?} → '{}'",
        path.display(),
        placement,
        output.display()
    );
    Ok(SignOutcome {
        output: output.to_path_buf(),
        placement,
    })
}

/// Content operations that draw `label` at the configured position.
fn stamp_operations(font_name: &str, label: &str, options: &SignOptions) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![Object::Name(font_name.as_bytes().to_vec()), options.font_size.into()],
        ),
        Operation::new("Td", vec![options.x.into(), options.y.into()]),
        Operation::new("Tj", vec![pdf::text_object(label)]),
        Operation::new("ET", vec![]),
    ]
}

fn add_content_stream(doc: &mut Document, operations: Vec<Operation>) -> Result<ObjectId, String> {
    let bytes = Content { operations }
        .encode()
        .map_err(|e| format!("encoding stamp content: {e}"))?;
    Ok(doc.add_object(Stream::new(dictionary! {}, bytes)))
}

/// The page's existing content stream references, in drawing order.
fn existing_contents(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            // An indirect array of stream references.
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Pick a font resource name not already used on the page.
fn free_font_name(fonts: &Dictionary) -> String {
    let mut name = "FSig".to_string();
    let mut n = 1;
    while fonts.has(name.as_bytes()) {
        name = format!("FSig{n}");
        n += 1;
    }
    name
}

fn overlay_first_page(doc: &mut Document, label: &str, options: &SignOptions) -> Result<(), String> {
    let page_id = *doc
        .get_pages()
        .get(&1)
        .ok_or_else(|| "document has no pages".to_string())?;
    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| format!("page 1 is unreadable: {e}"))?
        .clone();

    // Private copy of the (possibly inherited) resources, so shared
    // resource objects and sibling pages stay untouched.
    let mut resources = pdf::inherited_attribute(doc, page_id, b"Resources")
        .and_then(|obj| pdf::resolve_dictionary(doc, &obj))
        .unwrap_or_default();
    let mut fonts = resources
        .get(b"Font")
        .ok()
        .and_then(|obj| pdf::resolve_dictionary(doc, obj))
        .unwrap_or_default();

    let font_name = free_font_name(&fonts);
    let font_id = pdf::add_helvetica(doc, false);
    fonts.set(font_name.as_bytes().to_vec(), Object::Reference(font_id));
    resources.set("Font", Object::Dictionary(fonts));

    let open_id = add_content_stream(doc, vec![Operation::new("q", vec![])])?;
    let mut closing = vec![Operation::new("Q", vec![])];
    closing.extend(stamp_operations(&font_name, label, options));
    let close_id = add_content_stream(doc, closing)?;

    let mut contents = vec![Object::Reference(open_id)];
    contents.extend(existing_contents(doc, &page));
    contents.push(Object::Reference(close_id));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| format!("page 1 is unreadable: {e}"))?;
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Array(contents));
    Ok(())
}

fn append_signature_page(doc: &mut Document, label: &str, options: &SignOptions) -> Result<(), String> {
    let pages_id = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| format!("no page tree: {e}"))?;

    let media_box = doc
        .get_pages()
        .get(&1)
        .map(|&first| pdf::media_box(doc, first))
        .unwrap_or(pdf::LETTER);

    let font_id = pdf::add_helvetica(doc, false);
    let content_id = add_content_stream(doc, stamp_operations("FSig", label, options))?;
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => media_box.iter().map(|&v| Object::Real(v)).collect::<Vec<_>>(),
        "Resources" => dictionary! {
            "Font" => dictionary! { "FSig" => Object::Reference(font_id) },
        },
        "Contents" => Object::Reference(content_id),
    });

    let tree = doc
        .get_dictionary_mut(pages_id)
        .map_err(|e| format!("page tree is unreadable: {e}"))?;
    let count = tree.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    if let Ok(Object::Array(kids)) = tree.get_mut(b"Kids") {
        kids.push(Object::Reference(page_id));
    } else {
        return Err("page tree has no Kids array".to_string());
    }
    tree.set("Count", Object::Integer(count + 1));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_uses_trimmed_signer() {
        assert_eq!(stamp_label("  Ada Lovelace "), "Signed by: Ada Lovelace");
    }

    #[test]
    fn blank_signer_gets_default_label() {
        assert_eq!(stamp_label("   "), "Signed by: Signed User");
    }

    #[test]
    fn font_name_avoids_collisions() {
        let mut fonts = Dictionary::new();
        assert_eq!(free_font_name(&fonts), "FSig");
        fonts.set("FSig", Object::Null);
        fonts.set("FSig1", Object::Null);
        assert_eq!(free_font_name(&fonts), "FSig2");
    }

    #[test]
    fn overlay_on_empty_document_is_refused() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.add_object(dictionary! {
            "Type" => "Pages",
            "Kids" => Vec::<Object>::new(),
            "Count" => Object::Integer(0),
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let err = overlay_first_page(&mut doc, "Signed by: X", &SignOptions::default()).unwrap_err();
        assert!(err.contains("no pages"));
    }

    #[test]
    fn sign_rejects_non_pdf_as_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.pdf");
        std::fs::write(&path, b"nope").unwrap();
        let err = sign(&path, &dir.path().join("o.pdf"), "A", &SignOptions::default()).unwrap_err();
        assert!(matches!(err, DocError::NotAPdf { .. }));
    }

    #[test]
    fn sign_reports_unparseable_pdf_as_conversion_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\ngarbage without xref").unwrap();
        let err = sign(&path, &dir.path().join("o.pdf"), "A", &SignOptions::default()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Conversion);
    }
}
