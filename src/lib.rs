//! # pdfdesk
//!
//! Document conversion backend: merge and split PDFs, stamp a signature,
//! render Word documents to PDF, extract PDFs back into Word (with an OCR
//! fallback for scanned pages), and tell the user over WhatsApp when the
//! result is ready.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload ──► FileStore
//!               │
//!               ├─ merge        [a.pdf, b.pdf] ──► merged.pdf
//!               ├─ split        a.pdf          ──► split_pages.zip
//!               ├─ sign         a.pdf, signer  ──► signed.pdf
//!               ├─ word_to_pdf  a.docx         ──► converted.pdf
//!               └─ pdf_to_word  a.pdf          ──► converted.docx
//!                                  │ no text layer
//!                                  └─ render (pdfium) ► vision model ► paragraphs
//!               │
//!               ▼
//!        register artifact ──► ArtifactHook ──► WhatsApp (daily limit, 24h window)
//! ```
//!
//! The operations in [`ops`] are plain synchronous functions over paths and
//! can be used on their own. [`DocumentService`] adds the store, time
//! budgets, and post-artifact hooks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfdesk::{DocumentService, OcrCapability, ServiceConfig};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::builder()
//!         .storage_dir("/var/lib/pdfdesk")
//!         .build()?;
//!     let ocr = OcrCapability::detect(&config.ocr);
//!     let service = DocumentService::new(config, ocr).await?;
//!
//!     let owner = Uuid::new_v4();
//!     let a = service.upload(owner, "a.pdf", std::fs::read("a.pdf")?).await?;
//!     let b = service.upload(owner, "b.pdf", std::fs::read("b.pdf")?).await?;
//!     let merged = service.merge(owner, &[a.id, b.id]).await?;
//!     println!("{}", service.share_link(owner, merged.id).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfdesk` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdfdesk = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod notify;
pub mod ocr;
pub mod ops;
pub mod progress;
pub mod prompts;
pub mod service;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    NotifyConfig, OcrConfig, PageLayout, ServiceConfig, ServiceConfigBuilder, SignOptions,
    SignStrategy,
};
pub use error::{DocError, ErrorKind, PageError};
pub use notify::{
    ArtifactEvent, ArtifactHook, Delivery, MessageTransport, NotificationError,
    NotificationProfile, OutboundMessage, ProfileStore, WhatsAppCloud, WhatsAppConfig,
    WhatsAppNotifier,
};
pub use ocr::{OcrCapability, OcrEngine, PageText};
pub use ops::{SignOutcome, StampPlacement, TextSource, WordOutput};
pub use progress::{NoopProgress, OperationProgress, ProgressCallback};
pub use service::DocumentService;
pub use store::{FileStore, StoredFile};
