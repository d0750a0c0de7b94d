//! Text-only Word→PDF rendering.
//!
//! Every non-empty paragraph of the DOCX body is drawn at the left margin in
//! Helvetica, wrapped greedily at word boundaries to the printable width.
//! Paragraphs whose style id starts with `Heading` use Helvetica-Bold. When
//! the next baseline would fall below the bottom margin a new page starts at
//! the top margin. Images, tables, fonts and run formatting are not carried
//! over.

use crate::config::PageLayout;
use crate::error::DocError;
use crate::ops::{input, pdf};
use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Helvetica advance widths for ASCII 0x20..=0x7E, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

/// Bold glyphs run wider; scaling the regular metrics keeps wrapping conservative.
const BOLD_FACTOR: f32 = 1.1;

/// A paragraph of body text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub text: String,
    pub heading: bool,
}

/// One line placed on a page.
#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    text: String,
    y: f32,
    bold: bool,
}

/// Render the paragraphs of the DOCX at `path` into a PDF at `output`.
pub fn word_to_pdf(path: &Path, output: &Path, layout: &PageLayout) -> Result<PathBuf, DocError> {
    input::check_docx(path)?;
    let bytes = std::fs::read(path).map_err(|_| DocError::FileNotFound {
        path: path.to_path_buf(),
    })?;
    let blocks = read_blocks(&bytes)?;
    let pages = paginate(&blocks, layout);
    debug!("Laid out {} paragraphs on {} pages", blocks.len(), pages.len());

    let mut doc = render(&pages, layout)?;
    pdf::save(&mut doc, "word_to_pdf", output)?;
    info!(
        "Rendered '{}' ({} pages) → '{}'",
        path.display(),
        pages.len(),
        output.display()
    );
    Ok(output.to_path_buf())
}

/// Parse the DOCX body into non-empty text blocks, in document order.
pub fn read_blocks(bytes: &[u8]) -> Result<Vec<TextBlock>, DocError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocError::conversion("word_to_pdf", e))?;
    let mut blocks = Vec::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            let mut text = String::new();
            collect_text(&paragraph.children, &mut text);
            if text.trim().is_empty() {
                continue;
            }
            let heading = paragraph
                .property
                .style
                .as_ref()
                .is_some_and(|style| style.val.starts_with("Heading"));
            blocks.push(TextBlock { text, heading });
        }
    }
    Ok(blocks)
}

fn collect_text(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for piece in &run.children {
                    match piece {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push(' '),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_text(&link.children, out),
            _ => {}
        }
    }
}

/// Width of `text` in points.
fn text_width(text: &str, font_size: f32, bold: bool) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = u32::from(c);
            if (0x20..=0x7E).contains(&code) {
                u32::from(HELVETICA_WIDTHS[(code - 0x20) as usize])
            } else {
                556
            }
        })
        .sum();
    let scale = if bold { BOLD_FACTOR } else { 1.0 };
    units as f32 / 1000.0 * font_size * scale
}

/// Greedy word wrap. Words wider than the line are broken between characters.
pub fn wrap_text(text: &str, max_width: f32, font_size: f32, bold: bool) -> Vec<String> {
    let fits = |s: &str| text_width(s, font_size, bold) <= max_width;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if fits(&candidate) {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if fits(word) {
            current = word.to_string();
            continue;
        }
        for c in word.chars() {
            current.push(c);
            if !fits(&current) && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::take(&mut current));
                current.push(c);
            }
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Assign every wrapped line a page and a baseline. Always yields at least one page.
fn paginate(blocks: &[TextBlock], layout: &PageLayout) -> Vec<Vec<PlacedLine>> {
    let mut pages: Vec<Vec<PlacedLine>> = vec![Vec::new()];
    let mut y = layout.top_baseline();

    for block in blocks {
        for line in wrap_text(
            &block.text,
            layout.printable_width(),
            layout.font_size,
            block.heading,
        ) {
            if y < layout.margin_bottom {
                pages.push(Vec::new());
                y = layout.top_baseline();
            }
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    text: line,
                    y,
                    bold: block.heading,
                });
            }
            y -= layout.line_height;
        }
    }
    pages
}

fn render(pages: &[Vec<PlacedLine>], layout: &PageLayout) -> Result<Document, DocError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = pdf::add_helvetica(&mut doc, false);
    let bold = pdf::add_helvetica(&mut doc, true);

    let mut kids = Vec::with_capacity(pages.len());
    for lines in pages {
        let mut operations = Vec::with_capacity(lines.len() * 5);
        for line in lines {
            let font = if line.bold { "F2" } else { "F1" };
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![font.into(), layout.font_size.into()],
            ));
            operations.push(Operation::new(
                "Td",
                vec![layout.margin_left.into(), line.y.into()],
            ));
            operations.push(Operation::new("Tj", vec![pdf::text_object(&line.text)]));
            operations.push(Operation::new("ET", vec![]));
        }
        let bytes = Content { operations }
            .encode()
            .map_err(|e| DocError::conversion("word_to_pdf", e))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => Object::Reference(pages_id),
            "Contents" => Object::Reference(content_id),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(layout.page_width),
                Object::Real(layout.page_height),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => Object::Reference(regular),
                    "F2" => Object::Reference(bold),
                },
            },
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));
    doc.compress();
    Ok(doc)
}
