//! Shared fixtures: synthetic PDFs (lopdf), DOCX files (docx-rs) and a
//! scripted OCR engine.

#![allow(dead_code)]

use async_trait::async_trait;
use docx_rs::{Docx, Paragraph, Run};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdfdesk::ocr::{OcrEngine, PageText};
use pdfdesk::{DocError, ProgressCallback};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

fn finish(doc: Document, pages_id: ObjectId, kids: Vec<Object>, path: &Path) {
    let count = Object::Integer(kids.len() as i64);
    finish_with_count(doc, pages_id, kids, count, path);
}

fn finish_with_count(
    mut doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    count: Object,
    path: &Path,
) {
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.save(path).unwrap();
}

fn text_operations(lines: &[&str]) -> Vec<Operation> {
    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(50), Object::Integer(780 - 20 * i as i64)],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(line.as_bytes().to_vec(), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }
    operations
}

fn helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

/// Like [`text_pdf`], but the pages hang off an intermediate `/Pages` node
/// that carries the font resources, the way many producers lay out the tree.
pub fn nested_text_pdf(path: &Path, pages: &[&[&str]]) {
    let mut doc = Document::with_version("1.5");
    let root_id = doc.new_object_id();
    let branch_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut leaves = Vec::new();
    for lines in pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            Content { operations: text_operations(lines) }.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(branch_id),
            "Contents" => Object::Reference(content_id),
        });
        leaves.push(Object::Reference(page_id));
    }
    let count = Object::Integer(leaves.len() as i64);
    doc.objects.insert(
        branch_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Parent" => Object::Reference(root_id),
            "Kids" => leaves,
            "Count" => count.clone(),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        }),
    );
    finish_with_count(doc, root_id, vec![Object::Reference(branch_id)], count, path);
}

/// A PDF whose page `i` draws `pages[i]`, one text line per entry.
pub fn text_pdf(path: &Path, pages: &[&[&str]]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut kids = Vec::new();
    for lines in pages {
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            Content { operations: text_operations(lines) }.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => Object::Reference(font_id) },
            },
        });
        kids.push(Object::Reference(page_id));
    }
    finish(doc, pages_id, kids, path);
}

/// A PDF of `n` pages that only paint a filled rectangle: no text layer.
pub fn image_only_pdf(path: &Path, n: usize) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..n {
        let operations = vec![
            Operation::new("g", vec![Object::Real(0.5)]),
            Operation::new(
                "re",
                vec![
                    Object::Integer(50),
                    Object::Integer(50),
                    Object::Integer(400),
                    Object::Integer(600),
                ],
            ),
            Operation::new("f", vec![]),
        ];
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            Content { operations }.encode().unwrap(),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }
    finish(doc, pages_id, kids, path);
}

/// A structurally valid PDF with an empty page tree.
pub fn empty_pdf(path: &Path) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    finish(doc, pages_id, Vec::new(), path);
}

/// A DOCX with one paragraph per entry; `true` marks a Heading1 paragraph.
pub fn docx(path: &Path, paragraphs: &[(&str, bool)]) {
    let doc = paragraphs.iter().fold(Docx::new(), |doc, (text, heading)| {
        let mut p = Paragraph::new().add_run(Run::new().add_text(*text));
        if *heading {
            p = p.style("Heading1");
        }
        doc.add_paragraph(p)
    });
    let file = std::fs::File::create(path).unwrap();
    doc.build().pack(file).unwrap();
}

/// Paragraph texts of a DOCX file, in order.
pub fn docx_paragraphs(path: &Path) -> Vec<String> {
    let bytes = std::fs::read(path).unwrap();
    pdfdesk::ops::word_to_pdf::read_blocks(&bytes)
        .unwrap()
        .into_iter()
        .map(|b| b.text)
        .collect()
}

pub fn page_count(path: &Path) -> usize {
    Document::load(path).unwrap().get_pages().len()
}

/// Extracted text of one 1-based page.
pub fn page_text(path: &Path, page: u32) -> String {
    let mut doc = Document::load(path).unwrap();
    pdfdesk::ops::pdf::materialize_inherited(&mut doc);
    doc.extract_text(&[page]).unwrap()
}

/// An OCR engine that returns fixed per-page texts and counts its calls.
pub struct ScriptedOcr {
    pub pages: Vec<String>,
    pub calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn recognize(
        &self,
        _pdf_path: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<PageText>, DocError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let total = self.pages.len();
        if let Some(p) = progress {
            p.on_operation_start("ocr", total);
        }
        let pages = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, text)| {
                if let Some(p) = progress {
                    p.on_page_complete(i + 1, total, text.len());
                }
                PageText {
                    page_num: i + 1,
                    text: text.clone(),
                    error: None,
                    duration_ms: 1,
                }
            })
            .collect();
        if let Some(p) = progress {
            p.on_operation_complete(total, total);
        }
        Ok(pages)
    }
}
