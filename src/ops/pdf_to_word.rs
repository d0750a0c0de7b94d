//! PDF→Word: direct text extraction with an OCR fallback.
//!
//! ```text
//!  extract text ──non-empty──► one paragraph per non-empty line
//!       │
//!     empty
//!       ▼
//!  OCR capability? ──absent──► OcrUnavailable
//!       │
//!    present
//!       ▼
//!  recognise pages ──any text──► one paragraph per page with text
//!       │
//!     nothing
//!       ▼
//!   NoTextFound
//! ```
//!
//! A DOCX is only written when there is at least one paragraph.

use crate::error::DocError;
use crate::ocr::OcrCapability;
use crate::ops::{input, pdf};
use crate::progress::ProgressCallback;
use docx_rs::{Docx, Paragraph, Run};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How the paragraphs were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSource {
    /// Embedded text layer.
    Direct,
    /// Vision-model OCR of rendered pages.
    Ocr,
}

/// Result of [`pdf_to_word`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordOutput {
    pub output: PathBuf,
    pub paragraphs: usize,
    pub source: TextSource,
}

/// Paragraphs read from a PDF, ready to be written as DOCX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub paragraphs: Vec<String>,
    pub source: TextSource,
}

/// Convert the PDF at `path` into a DOCX at `output`.
pub async fn pdf_to_word(
    path: &Path,
    output: &Path,
    ocr: &OcrCapability,
    progress: Option<&ProgressCallback>,
) -> Result<WordOutput, DocError> {
    let Transcript { paragraphs, source } = read_paragraphs(path, ocr, progress).await?;

    let count = paragraphs.len();
    let out = output.to_path_buf();
    tokio::task::spawn_blocking(move || write_docx(&paragraphs, &out))
        .await
        .map_err(|e| DocError::Internal(format!("DOCX writer task panicked: {e}")))??;

    info!(
        "Converted '{}' → '{}' ({} paragraphs via {:?})",
        path.display(),
        output.display(),
        count,
        source
    );
    Ok(WordOutput {
        output: output.to_path_buf(),
        paragraphs: count,
        source,
    })
}

/// Read the paragraphs of `path`: the text layer if there is one, OCR otherwise.
///
/// Writes nothing, so dropping the future part-way leaves no file behind.
pub async fn read_paragraphs(
    path: &Path,
    ocr: &OcrCapability,
    progress: Option<&ProgressCallback>,
) -> Result<Transcript, DocError> {
    let owned = path.to_path_buf();
    let (text, pages) = tokio::task::spawn_blocking(move || extract_direct(&owned))
        .await
        .map_err(|e| DocError::Internal(format!("Extraction task panicked: {e}")))??;

    if text.trim().is_empty() {
        debug!(
            "'{}' has no text layer ({} pages); trying OCR",
            path.display(),
            pages
        );
        Ok(Transcript {
            paragraphs: ocr_paragraphs(path, ocr, pages, progress).await?,
            source: TextSource::Ocr,
        })
    } else {
        Ok(Transcript {
            paragraphs: line_paragraphs(&text),
            source: TextSource::Direct,
        })
    }
}

async fn ocr_paragraphs(
    path: &Path,
    ocr: &OcrCapability,
    pages: usize,
    progress: Option<&ProgressCallback>,
) -> Result<Vec<String>, DocError> {
    let engine = match ocr {
        OcrCapability::Present(engine) => engine,
        OcrCapability::Absent { reason } => {
            return Err(DocError::OcrUnavailable {
                path: path.to_path_buf(),
                reason: reason.clone(),
            });
        }
    };

    let results = engine.recognize(path, progress).await?;
    for page in &results {
        if let Some(err) = &page.error {
            warn!("{}", err);
        }
    }
    let paragraphs: Vec<String> = results
        .into_iter()
        .map(|page| sanitize(page.text.trim()))
        .filter(|text| !text.is_empty())
        .collect();

    if paragraphs.is_empty() {
        return Err(DocError::NoTextFound {
            path: path.to_path_buf(),
            pages,
        });
    }
    Ok(paragraphs)
}

/// Extract the text layer of every page, returning it with the page count.
///
/// A page whose text cannot be decoded contributes nothing; only an
/// unparseable document is an error.
fn extract_direct(path: &Path) -> Result<(String, usize), DocError> {
    let mut doc = pdf::load(path)?;
    // Text extraction only looks at page-level fonts.
    pdf::materialize_inherited(&mut doc);
    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

    let mut text = String::new();
    for &number in &numbers {
        match doc.extract_text(&[number]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                if !page_text.ends_with('\n') {
                    text.push('\n');
                }
            }
            Err(e) => debug!("No text extracted from page {}: {}", number, e),
        }
    }
    Ok((text, numbers.len()))
}

/// One paragraph per non-empty line, trimmed, in order.
pub fn line_paragraphs(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| sanitize(line.trim()))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Drop control characters that are not allowed in WordprocessingML text.
fn sanitize(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\t' || c == '\n' || !c.is_control())
        .collect()
}

/// Write one DOCX paragraph per entry.
pub fn write_docx(paragraphs: &[String], output: &Path) -> Result<(), DocError> {
    input::ensure_parent(output)?;
    let docx = paragraphs.iter().fold(Docx::new(), |docx, text| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
    });
    let file = std::fs::File::create(output).map_err(|e| DocError::OutputWriteFailed {
        path: output.to_path_buf(),
        source: e,
    })?;
    docx.build()
        .pack(file)
        .map_err(|e| DocError::conversion("pdf_to_word", e))?;
    Ok(())
}
