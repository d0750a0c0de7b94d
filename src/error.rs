//! Error types for the pdfdesk library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocError`] is **fatal**: the operation cannot produce its output
//!   (bad input file, corrupt PDF, OCR capability missing, timeout). Returned
//!   as `Err(DocError)` from every operation and from the document service.
//!
//! * [`PageError`] is **non-fatal**: a single page failed during OCR
//!   (render glitch, transient vision-model error) while other pages are fine.
//!   Stored inside [`crate::ocr::PageText`] so the extractor can keep whatever
//!   text the remaining pages produced.
//!
//! Notification transport failures have their own type,
//! [`crate::notify::NotificationError`], which never crosses the
//! notification boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`DocError`].
///
/// Callers map this onto their own surface (HTTP status, exit code) to tell
/// "bad input" apart from "system fault".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing, invalid or corrupt input. Retrying with the same input will fail again.
    Input,
    /// A library-level failure mid-transform.
    Conversion,
    /// The input needs a capability the running environment lacks, or holds no usable content.
    Capability,
    /// The operation exceeded its configured time budget.
    Timeout,
    /// Storage, configuration or runtime failure.
    Internal,
}

/// All fatal errors returned by the pdfdesk library.
#[derive(Debug, Error)]
pub enum DocError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// The file exists and was read, but is not a DOCX (zip) container.
    #[error("File is not a valid DOCX document: '{path}'\nFirst bytes: {magic:?}")]
    NotADocx { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// Merge needs at least two documents.
    #[error("Merging needs at least two PDFs, got {count}")]
    TooFewInputs { count: usize },

    /// Upload rejected before any processing.
    #[error("Upload '{filename}' is {size} bytes; the limit is {limit} bytes")]
    UploadTooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    /// No stored file with this id belongs to the caller.
    #[error("Stored file {id} not found")]
    StoredFileNotFound { id: uuid::Uuid },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The underlying PDF/DOCX library failed mid-transform.
    #[error("{operation} failed: {detail}")]
    Conversion {
        operation: &'static str,
        detail: String,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The document has no embedded text and no OCR engine is available.
    #[error(
        "'{path}' has no extractable text and OCR is not available in this environment.\n{reason}"
    )]
    OcrUnavailable { path: PathBuf, reason: String },

    /// OCR ran on every page but produced nothing usable.
    #[error("No text found in '{path}' ({pages} pages scanned)")]
    NoTextFound { path: PathBuf, pages: usize },

    /// The configured vision provider could not be created.
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Time budget ───────────────────────────────────────────────────────
    /// The operation ran longer than its configured timeout.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    // ── Storage / I/O errors ──────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file store index or a stored blob could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocError {
    /// Classify the error for the caller.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocError::FileNotFound { .. }
            | DocError::PermissionDenied { .. }
            | DocError::NotAPdf { .. }
            | DocError::NotADocx { .. }
            | DocError::CorruptPdf { .. }
            | DocError::TooFewInputs { .. }
            | DocError::UploadTooLarge { .. }
            | DocError::StoredFileNotFound { .. } => ErrorKind::Input,
            DocError::Conversion { .. } => ErrorKind::Conversion,
            DocError::OcrUnavailable { .. }
            | DocError::NoTextFound { .. }
            | DocError::ProviderNotConfigured { .. } => ErrorKind::Capability,
            DocError::Timeout { .. } => ErrorKind::Timeout,
            DocError::OutputWriteFailed { .. }
            | DocError::Storage(_)
            | DocError::InvalidConfig(_)
            | DocError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a library failure inside `operation`.
    pub(crate) fn conversion(operation: &'static str, detail: impl ToString) -> Self {
        DocError::Conversion {
            operation,
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal error for a single OCR page.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// Vision call failed after retries.
    #[error("Page {page}: OCR call failed after {retries} retries: {detail}")]
    OcrFailed {
        page: usize,
        retries: u8,
        detail: String,
    },
}
