//! Configuration types for the document service.
//!
//! All behaviour is controlled through [`ServiceConfig`], built via its
//! [`ServiceConfigBuilder`]. Each operation family has its own sub-config
//! ([`PageLayout`], [`SignOptions`], [`OcrConfig`], [`NotifyConfig`]) so the
//! stand-alone operations in [`crate::ops`] can be called with just the piece
//! they need.

use crate::error::DocError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a [`crate::service::DocumentService`].
///
/// # Example
/// ```rust
/// use pdfdesk::{ServiceConfig, SignStrategy};
///
/// let config = ServiceConfig::builder()
///     .storage_dir("/var/lib/pdfdesk")
///     .max_upload_bytes(10 * 1024 * 1024)
///     .sign_strategy(SignStrategy::AppendPage)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Root of the file store (blobs + index). Default: `$TMPDIR/pdfdesk/store`.
    pub storage_dir: PathBuf,

    /// Scratch directory for operation outputs before they are registered.
    /// Default: `$TMPDIR/pdfdesk/work`.
    pub work_dir: PathBuf,

    /// Upload size ceiling in bytes, enforced before any conversion. Default: 25 MiB.
    pub max_upload_bytes: u64,

    /// Time budget for merge, split, sign and Word→PDF, in seconds. Default: 120.
    pub operation_timeout_secs: u64,

    /// Time budget for PDF→Word, which may fall back to OCR. Default: 600.
    ///
    /// OCR cost grows with page count and the vision model's latency, so it
    /// gets a separate, larger budget.
    pub ocr_timeout_secs: u64,

    /// Word→PDF page geometry.
    pub layout: PageLayout,

    /// Signature stamp placement.
    pub sign: SignOptions,

    /// OCR fallback settings.
    pub ocr: OcrConfig,

    /// Notification policy.
    pub notify: NotifyConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let root = std::env::temp_dir().join("pdfdesk");
        Self {
            storage_dir: root.join("store"),
            work_dir: root.join("work"),
            max_upload_bytes: 25 * 1024 * 1024,
            operation_timeout_secs: 120,
            ocr_timeout_secs: 600,
            layout: PageLayout::default(),
            sign: SignOptions::default(),
            ocr: OcrConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder for `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage_dir = dir.into();
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = dir.into();
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn operation_timeout_secs(mut self, secs: u64) -> Self {
        self.config.operation_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn layout(mut self, layout: PageLayout) -> Self {
        self.config.layout = layout;
        self
    }

    pub fn sign_strategy(mut self, strategy: SignStrategy) -> Self {
        self.config.sign.strategy = strategy;
        self
    }

    pub fn sign_options(mut self, options: SignOptions) -> Self {
        self.config.sign = options;
        self
    }

    pub fn ocr(mut self, ocr: OcrConfig) -> Self {
        self.config.ocr = ocr;
        self
    }

    pub fn daily_limit(mut self, limit: u32) -> Self {
        self.config.notify.daily_limit = limit;
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.notify.public_base_url = url.into();
        self
    }

    pub fn notify(mut self, notify: NotifyConfig) -> Self {
        self.config.notify = notify;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, DocError> {
        let c = &self.config;
        if c.max_upload_bytes == 0 {
            return Err(DocError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if c.operation_timeout_secs == 0 || c.ocr_timeout_secs == 0 {
            return Err(DocError::InvalidConfig("Timeouts must be ≥ 1s".into()));
        }
        c.layout.validate()?;
        if c.ocr.concurrency == 0 {
            return Err(DocError::InvalidConfig("OCR concurrency must be ≥ 1".into()));
        }
        if c.ocr.max_rendered_pixels < 100 {
            return Err(DocError::InvalidConfig(format!(
                "max_rendered_pixels must be ≥ 100, got {}",
                c.ocr.max_rendered_pixels
            )));
        }
        if c.sign.font_size <= 0.0 {
            return Err(DocError::InvalidConfig(format!(
                "Stamp font size must be positive, got {}",
                c.sign.font_size
            )));
        }
        if c.notify.window_hours == 0 {
            return Err(DocError::InvalidConfig(
                "Messaging window must be ≥ 1 hour".into(),
            ));
        }
        if c.notify.day_boundary_offset_minutes.abs() >= 24 * 60 {
            return Err(DocError::InvalidConfig(format!(
                "Day boundary offset must be within ±24h, got {} minutes",
                c.notify.day_boundary_offset_minutes
            )));
        }
        Ok(self.config)
    }
}

// ── Word → PDF geometry ──────────────────────────────────────────────────

/// Fixed page geometry for the text-only Word→PDF renderer. Units are PDF points.
///
/// Defaults are A4 with a 40 pt left margin, 12 pt Helvetica and a 15 pt
/// line pitch; the first baseline sits at y = 800.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub font_size: f32,
    pub line_height: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: 595.0,
            page_height: 842.0,
            margin_left: 40.0,
            margin_right: 40.0,
            margin_top: 42.0,
            margin_bottom: 40.0,
            font_size: 12.0,
            line_height: 15.0,
        }
    }
}

impl PageLayout {
    /// Baseline of the first line on a fresh page.
    pub fn top_baseline(&self) -> f32 {
        self.page_height - self.margin_top
    }

    /// Width available for text between the side margins.
    pub fn printable_width(&self) -> f32 {
        self.page_width - self.margin_left - self.margin_right
    }

    fn validate(&self) -> Result<(), DocError> {
        if self.font_size <= 0.0 || self.line_height <= 0.0 {
            return Err(DocError::InvalidConfig(
                "Font size and line height must be positive".into(),
            ));
        }
        if self.printable_width() < self.font_size {
            return Err(DocError::InvalidConfig(format!(
                "Side margins leave {}pt for text on a {}pt page",
                self.printable_width(),
                self.page_width
            )));
        }
        if self.top_baseline() - self.margin_bottom < self.line_height {
            return Err(DocError::InvalidConfig(
                "Vertical margins leave no room for a single line".into(),
            ));
        }
        Ok(())
    }
}

// ── Signing ──────────────────────────────────────────────────────────────

/// Where the signature stamp goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SignStrategy {
    /// Draw the stamp on page 1 in extra content streams; page count is unchanged. (default)
    #[default]
    Overlay,
    /// Append a trailing page that carries only the stamp.
    AppendPage,
}

/// Signature stamp settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignOptions {
    pub strategy: SignStrategy,
    /// Stamp baseline origin, from the page's bottom-left corner.
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            strategy: SignStrategy::default(),
            x: 40.0,
            y: 25.0,
            font_size: 9.0,
        }
    }
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Settings for the vision-model OCR engine.
#[derive(Clone)]
pub struct OcrConfig {
    /// Maximum rendered image dimension (width or height) in pixels. Default: 2000.
    ///
    /// Caps memory for oversized pages; a scanned A0 poster would otherwise
    /// rasterise to hundreds of megapixels.
    pub max_rendered_pixels: u32,

    /// Directory holding the pdfium shared library. `None` uses the system library.
    pub pdfium_library_dir: Option<PathBuf>,

    /// Vision model identifier, e.g. "gpt-4.1-nano". If None, uses provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0; transcription should be literal.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Pages sent to the vision model at once. Default: 4.
    pub concurrency: usize,

    /// Retry attempts per page on a transient failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::OCR_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            max_rendered_pixels: 2000,
            pdfium_library_dir: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            concurrency: 4,
            max_retries: 3,
            retry_backoff_ms: 500,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("pdfium_library_dir", &self.pdfium_library_dir)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("concurrency", &self.concurrency)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

// ── Notifications ────────────────────────────────────────────────────────

/// Notification policy knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Messages allowed per user per calendar day. Default: 5.
    pub daily_limit: u32,

    /// Session window after the user's last inbound message, in hours. Default: 24.
    ///
    /// WhatsApp only accepts free-form messages inside this window; outside
    /// it, a pre-approved template must be used.
    pub window_hours: u32,

    /// Name of the approved template sent outside the window.
    pub template_name: String,

    /// Language code of the template.
    pub template_language: String,

    /// Base URL for public share links, e.g. "https://files.example.com".
    pub public_base_url: String,

    /// Offset from UTC, in minutes, of the timezone whose midnight resets the
    /// daily counter. Default: 0.
    pub day_boundary_offset_minutes: i32,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            daily_limit: 5,
            window_hours: 24,
            template_name: "file_ready".into(),
            template_language: "en_US".into(),
            public_base_url: "http://localhost:8000".into(),
            day_boundary_offset_minutes: 0,
        }
    }
}

impl NotifyConfig {
    /// Public share link for a stored file's token.
    pub fn public_url(&self, token: &uuid::Uuid) -> String {
        format!(
            "{}/files/public/{}/",
            self.public_base_url.trim_end_matches('/'),
            token
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build() {
        let config = ServiceConfig::builder().build().expect("defaults are valid");
        assert_eq!(config.notify.daily_limit, 5);
        assert_eq!(config.sign.strategy, SignStrategy::Overlay);
        assert_eq!(config.layout.top_baseline(), 800.0);
    }

    #[test]
    fn zero_upload_limit_rejected() {
        let err = ServiceConfig::builder().max_upload_bytes(0).build().unwrap_err();
        assert!(matches!(err, DocError::InvalidConfig(_)));
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(ServiceConfig::builder()
            .ocr_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn cramped_layout_rejected() {
        let layout = PageLayout {
            margin_left: 300.0,
            margin_right: 300.0,
            ..PageLayout::default()
        };
        assert!(ServiceConfig::builder().layout(layout).build().is_err());
    }

    #[test]
    fn day_boundary_offset_is_bounded() {
        let notify = NotifyConfig {
            day_boundary_offset_minutes: 24 * 60,
            ..NotifyConfig::default()
        };
        assert!(ServiceConfig::builder().notify(notify).build().is_err());

        let notify = NotifyConfig {
            day_boundary_offset_minutes: -5 * 60,
            ..NotifyConfig::default()
        };
        assert!(ServiceConfig::builder().notify(notify).build().is_ok());
    }

    #[test]
    fn public_url_trims_trailing_slash() {
        let notify = NotifyConfig {
            public_base_url: "https://files.example.com/".into(),
            ..NotifyConfig::default()
        };
        let token = uuid::Uuid::nil();
        assert_eq!(
            notify.public_url(&token),
            "https://files.example.com/files/public/00000000-0000-0000-0000-000000000000/"
        );
    }
}
