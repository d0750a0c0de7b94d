//! Page-level recombination: merge several PDFs, split one into single pages.

use crate::error::DocError;
use crate::ops::pdf;
use crate::progress::ProgressCallback;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Concatenate the pages of `paths`, in order, into a single PDF at `output`.
///
/// Within each input the original page order is kept. Inherited attributes
/// (resources, media and crop boxes, rotation) are copied onto every page
/// before the inputs' page trees are replaced by one flat tree, so no page
/// loses its fonts or geometry.
pub fn merge(paths: &[PathBuf], output: &Path) -> Result<PathBuf, DocError> {
    if paths.len() < 2 {
        return Err(DocError::TooFewInputs { count: paths.len() });
    }

    let mut next_id = 1;
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for path in paths {
        let mut doc = pdf::load(path)?;
        pdf::materialize_inherited(&mut doc);
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        // get_pages walks the tree in reading order, keyed by page number.
        let pages = doc.get_pages();
        debug!("Merging {} pages from '{}'", pages.len(), path.display());
        page_ids.extend(pages.into_values());

        for (id, object) in doc.objects {
            let skip = matches!(
                object.type_name().unwrap_or_default(),
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline"
            );
            if !skip {
                objects.insert(id, object);
            }
        }
    }

    let mut merged = Document::with_version("1.5");
    merged.objects = objects;
    merged.max_id = next_id - 1;

    let pages_id = merged.new_object_id();
    for &page_id in &page_ids {
        if let Ok(page) = merged.get_dictionary_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }
    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_ids.len() as i64),
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    merged.trailer.set("Root", Object::Reference(catalog_id));

    merged.renumber_objects();
    merged.compress();
    pdf::save(&mut merged, "merge", output)?;

    info!(
        "Merged {} files ({} pages) into '{}'",
        paths.len(),
        page_ids.len(),
        output.display()
    );
    Ok(output.to_path_buf())
}

/// Write each page of `path` to `output_dir/page_<n>.pdf`, numbered from 1.
///
/// Each output holds only the objects its page reaches, so the cost grows
/// with the size of the document rather than pages × document.
/// Returns the files in page order. A PDF without pages produces an empty list.
pub fn split(
    path: &Path,
    output_dir: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<PathBuf>, DocError> {
    let mut doc = pdf::load(path)?;
    pdf::materialize_inherited(&mut doc);
    let pages = doc.get_pages();
    let total = pages.len();

    std::fs::create_dir_all(output_dir).map_err(|e| DocError::OutputWriteFailed {
        path: output_dir.to_path_buf(),
        source: e,
    })?;

    if let Some(cb) = progress {
        cb.on_operation_start("split", total);
    }

    let mut outputs = Vec::with_capacity(total);
    for (&number, &page_id) in &pages {
        let mut single = single_page(&doc, page_id);
        single.compress();

        let out = output_dir.join(format!("page_{number}.pdf"));
        pdf::save(&mut single, "split", &out)?;
        if let Some(cb) = progress {
            cb.on_page_complete(number as usize, total, 0);
        }
        outputs.push(out);
    }

    if let Some(cb) = progress {
        cb.on_operation_complete(total, outputs.len());
    }
    info!(
        "Split '{}' into {} pages under '{}'",
        path.display(),
        outputs.len(),
        output_dir.display()
    );
    Ok(outputs)
}

/// A one-page document holding `page_id` and every object it references.
///
/// `/Parent` links are not followed. References to other pages (link
/// annotations, `/P` back-pointers) become null.
fn single_page(doc: &Document, page_id: ObjectId) -> Document {
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut pending = vec![page_id];
    while let Some(id) = pending.pop() {
        if objects.contains_key(&id) {
            continue;
        }
        let Ok(object) = doc.get_object(id) else {
            continue;
        };
        let is_other_page = id != page_id
            && matches!(object.type_name().unwrap_or_default(), b"Page" | b"Pages");
        if is_other_page {
            continue;
        }
        collect_references(object, &mut pending);
        objects.insert(id, object.clone());
    }
    let kept: BTreeSet<ObjectId> = objects.keys().copied().collect();
    for object in objects.values_mut() {
        null_missing(object, &kept);
    }

    let mut single = Document::with_version(doc.version.clone());
    single.objects = objects;
    single.max_id = doc.max_id;

    let pages_id = single.new_object_id();
    if let Ok(page) = single.get_dictionary_mut(page_id) {
        page.set("Parent", Object::Reference(pages_id));
    }
    single.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => Object::Integer(1),
        }),
    );
    let catalog_id = single.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    single.trailer.set("Root", Object::Reference(catalog_id));
    single.renumber_objects();
    single
}

fn collect_references(object: &Object, pending: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => pending.push(*id),
        Object::Array(items) => items.iter().for_each(|o| collect_references(o, pending)),
        Object::Dictionary(dict) => collect_dict(dict, pending),
        Object::Stream(stream) => collect_dict(&stream.dict, pending),
        _ => {}
    }
}

/// Renumbering would otherwise point a dangling reference at an unrelated object.
fn null_missing(object: &mut Object, kept: &BTreeSet<ObjectId>) {
    if matches!(object, Object::Reference(id) if !kept.contains(id)) {
        *object = Object::Null;
        return;
    }
    match object {
        Object::Array(items) => items.iter_mut().for_each(|o| null_missing(o, kept)),
        Object::Dictionary(dict) => dict.iter_mut().for_each(|(_, o)| null_missing(o, kept)),
        Object::Stream(stream) => stream
            .dict
            .iter_mut()
            .for_each(|(_, o)| null_missing(o, kept)),
        _ => {}
    }
}

fn collect_dict(dict: &Dictionary, pending: &mut Vec<ObjectId>) {
    for (key, value) in dict.iter() {
        if key.as_slice() != b"Parent" {
            collect_references(value, pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_requires_two_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.pdf");

        let err = merge(&[], &out).unwrap_err();
        assert!(matches!(err, DocError::TooFewInputs { count: 0 }));

        let err = merge(&[dir.path().join("a.pdf")], &out).unwrap_err();
        assert!(matches!(err, DocError::TooFewInputs { count: 1 }));
        assert!(!out.exists());
    }

    #[test]
    fn merge_rejects_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = merge(
            &[dir.path().join("a.pdf"), dir.path().join("b.pdf")],
            &dir.path().join("out.pdf"),
        )
        .unwrap_err();
        assert!(matches!(err, DocError::FileNotFound { .. }));
    }

    fn page(doc: &mut Document, parent: ObjectId, marker: &str) -> ObjectId {
        let content = doc.add_object(lopdf::Stream::new(
            dictionary! {},
            format!("% {marker}").into_bytes(),
        ));
        doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(parent),
            "Contents" => Object::Reference(content),
        })
    }

    #[test]
    fn single_page_keeps_only_reachable_objects() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let first = page(&mut doc, pages_id, "first");
        let second = page(&mut doc, pages_id, "second");
        // A link annotation on page 1 pointing at page 2.
        let annot = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Dest" => vec![Object::Reference(second), Object::Name(b"Fit".to_vec())],
        });
        doc.get_dictionary_mut(first)
            .unwrap()
            .set("Annots", vec![Object::Reference(annot)]);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(first), Object::Reference(second)],
                "Count" => Object::Integer(2),
            }),
        );
        let catalog = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog));

        let single = single_page(&doc, first);
        assert_eq!(single.get_pages().len(), 1);
        let page_id = single.get_pages()[&1];
        let content = single.get_page_content(page_id).unwrap();
        assert_eq!(content, b"% first");
        let streams = single
            .objects
            .values()
            .filter(|o| matches!(o, Object::Stream(_)))
            .count();
        assert_eq!(streams, 1, "page 2's content must not be copied");
        let link = single
            .objects
            .values()
            .find(|o| o.type_name().ok() == Some(b"Annot".as_slice()))
            .and_then(|o| o.as_dict().ok())
            .unwrap();
        let dest = link.get(b"Dest").unwrap().as_array().unwrap();
        assert!(matches!(dest[0], Object::Null));
    }

    #[test]
    fn split_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"plain text").unwrap();
        let err = split(&path, &dir.path().join("pages"), None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Input);
    }
}
