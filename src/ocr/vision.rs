//! Vision-model OCR engine: pdfium renders, an LLM transcribes.
//!
//! ## Retry strategy
//!
//! 429 and 503 responses from hosted models are common under load and
//! usually clear within seconds. Each page call is retried with exponential
//! backoff (`retry_backoff_ms * 2^attempt`); with the defaults that is
//! 500 ms → 1 s → 2 s. A page that still fails keeps a [`PageError`] and
//! contributes no text, the other pages are unaffected.

use crate::config::OcrConfig;
use crate::error::{DocError, PageError};
use crate::ocr::render::{self, PdfiumSource, RenderedPage};
use crate::ocr::{cleanup, encode, OcrEngine, PageText};
use crate::progress::ProgressCallback;
use crate::prompts::{page_instruction, OCR_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// OCR through a vision-capable LLM.
pub struct VisionOcr {
    pdfium: PdfiumSource,
    provider: Arc<dyn LLMProvider>,
    config: OcrConfig,
}

impl VisionOcr {
    pub fn new(pdfium: PdfiumSource, provider: Arc<dyn LLMProvider>, config: OcrConfig) -> Self {
        Self {
            pdfium,
            provider,
            config,
        }
    }
}

#[async_trait]
impl OcrEngine for VisionOcr {
    fn name(&self) -> &str {
        "vision"
    }

    async fn recognize(
        &self,
        pdf_path: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<Vec<PageText>, DocError> {
        let rendered =
            render::render_pages(&self.pdfium, pdf_path, self.config.max_rendered_pixels).await?;
        let total = rendered.len();
        if let Some(cb) = progress {
            cb.on_operation_start("ocr", total);
        }

        let mut pages: Vec<PageText> = stream::iter(rendered.into_iter().map(|page| {
            let provider = Arc::clone(&self.provider);
            let config = &self.config;
            async move {
                let result = recognize_page(&provider, page, total, config).await;
                if let Some(cb) = progress {
                    match &result.error {
                        None => cb.on_page_complete(result.page_num, total, result.text.len()),
                        Some(e) => cb.on_page_error(result.page_num, total, &e.to_string()),
                    }
                }
                result
            }
        }))
        .buffer_unordered(self.config.concurrency)
        .collect()
        .await;
        pages.sort_by_key(|p| p.page_num);

        let succeeded = pages.iter().filter(|p| p.error.is_none()).count();
        if let Some(cb) = progress {
            cb.on_operation_complete(total, succeeded);
        }
        info!(
            "OCR of '{}': {}/{} pages transcribed",
            pdf_path.display(),
            succeeded,
            total
        );
        Ok(pages)
    }
}

async fn recognize_page(
    provider: &Arc<dyn LLMProvider>,
    page: RenderedPage,
    total: usize,
    config: &OcrConfig,
) -> PageText {
    let page_num = page.page_num;
    let encoded = page.image.and_then(|img| {
        encode::encode_page(&img).map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {e}"),
        })
    });
    match encoded {
        Ok(image) => transcribe_page(provider, page_num, total, image, config).await,
        Err(err) => PageText::failed(page_num, err, 0),
    }
}

/// Send one page image to the model and clean up the reply.
///
/// Never returns an error: failures after all retries land in `PageText::error`.
pub async fn transcribe_page(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    total: usize,
    image: ImageData,
    config: &OcrConfig,
) -> PageText {
    let start = Instant::now();
    let system_prompt = config.system_prompt.as_deref().unwrap_or(OCR_SYSTEM_PROMPT);
    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user_with_images(page_instruction(page_num, total), vec![image]),
    ];
    let options = build_options(config);

    let mut last_err: Option<String> = None;
    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                let text = cleanup::clean_transcript(&response.content);
                debug!(
                    "Page {}: {} chars, {} output tokens, {:?}",
                    page_num,
                    text.len(),
                    response.completion_tokens,
                    start.elapsed()
                );
                return PageText {
                    page_num,
                    text,
                    error: None,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
            Err(e) => {
                let msg = e.to_string();
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, msg);
                last_err = Some(msg);
            }
        }
    }

    let retries = u8::try_from(config.max_retries).unwrap_or(u8::MAX);
    PageText::failed(
        page_num,
        PageError::OcrFailed {
            page: page_num,
            retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        },
        start.elapsed().as_millis() as u64,
    )
}

fn build_options(config: &OcrConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| DocError::ProviderNotConfigured {
        provider: name.to_string(),
        hint: e.to_string(),
    })
}

/// Resolve the vision provider, most specific first.
///
/// 1. A pre-built provider on the config.
/// 2. A provider named on the config, with the configured model or a default.
/// 3. `PDFDESK_OCR_PROVIDER` + `PDFDESK_OCR_MODEL`, when both are set.
/// 4. OpenAI, when `OPENAI_API_KEY` is set.
/// 5. Whatever [`ProviderFactory::from_env`] can detect.
pub fn resolve_provider(config: &OcrConfig) -> Result<Arc<dyn LLMProvider>, DocError> {
    if let Some(provider) = &config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    if let Some(name) = &config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(name), Ok(env_model)) = (
        std::env::var("PDFDESK_OCR_PROVIDER"),
        std::env::var("PDFDESK_OCR_MODEL"),
    ) {
        if !name.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&name, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|key| !key.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be detected.\n\
                 Set OPENAI_API_KEY or ANTHROPIC_API_KEY, or pass --provider.\n\
                 Error: {e}"
            ),
        })?;
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_follow_config() {
        let config = OcrConfig {
            temperature: 0.2,
            max_tokens: 1024,
            ..OcrConfig::default()
        };
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(1024));
    }
}
