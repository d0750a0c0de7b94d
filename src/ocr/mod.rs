//! OCR fallback for PDFs without a text layer.
//!
//! The capability is decided once, at startup, by [`OcrCapability::detect`]
//! and then injected into the document service. Conversions never probe the
//! environment themselves; they either get an engine or a reason why there
//! isn't one.
//!
//! ```text
//!  PDF ──► render (pdfium, spawn_blocking) ──► encode PNG ──► vision model ──► cleanup
//!                                                  (buffer_unordered, retries)
//! ```

pub mod cleanup;
pub mod encode;
pub mod render;
pub mod vision;

use crate::config::OcrConfig;
use crate::error::{DocError, PageError};
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

pub use render::PdfiumSource;
pub use vision::VisionOcr;

/// Text recognised on one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_num: usize,
    /// Cleaned transcription; empty for a blank or failed page.
    pub text: String,
    /// Set when the page could not be recognised.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
    pub duration_ms: u64,
}

impl PageText {
    pub fn failed(page_num: usize, error: PageError, duration_ms: u64) -> Self {
        Self {
            page_num,
            text: String::new(),
            error: Some(error),
            duration_ms,
        }
    }
}

/// Something that can turn the pages of a PDF into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Recognise every page, in page order.
    ///
    /// Per-page failures are reported on the page; `Err` is reserved for
    /// failures that affect the whole document (cannot open it, engine down).
    async fn recognize(
        &self,
        pdf_path: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<PageText>, DocError>;
}

/// Whether OCR can run in this process.
#[derive(Clone)]
pub enum OcrCapability {
    Present(Arc<dyn OcrEngine>),
    Absent { reason: String },
}

impl OcrCapability {
    /// Probe for pdfium and a vision provider.
    ///
    /// Both must be available; otherwise the capability is absent and the
    /// reason names what is missing.
    pub fn detect(config: &OcrConfig) -> Self {
        let pdfium = match PdfiumSource::probe(config.pdfium_library_dir.as_deref()) {
            Ok(source) => source,
            Err(reason) => {
                warn!("OCR disabled: {}", reason);
                return OcrCapability::Absent { reason };
            }
        };
        let provider = match vision::resolve_provider(config) {
            Ok(provider) => provider,
            Err(e) => {
                let reason = e.to_string();
                warn!("OCR disabled: {}", reason);
                return OcrCapability::Absent { reason };
            }
        };
        info!(
            "OCR enabled (model: {})",
            config.model.as_deref().unwrap_or("provider default")
        );
        OcrCapability::Present(Arc::new(VisionOcr::new(pdfium, provider, config.clone())))
    }

    /// Wrap a ready engine.
    pub fn with_engine(engine: Arc<dyn OcrEngine>) -> Self {
        OcrCapability::Present(engine)
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        OcrCapability::Absent {
            reason: reason.into(),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, OcrCapability::Present(_))
    }
}

impl fmt::Debug for OcrCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OcrCapability::Present(engine) => {
                f.debug_tuple("Present").field(&engine.name()).finish()
            }
            OcrCapability::Absent { reason } => {
                f.debug_struct("Absent").field("reason", reason).finish()
            }
        }
    }
}
