//! Page rasterisation via pdfium.
//!
//! pdfium is a C++ library with thread-local state, so every call happens
//! inside `spawn_blocking` with a fresh binding. The rendered size is capped
//! by `max_rendered_pixels` on the longest edge rather than by DPI: a scanned
//! A0 page at scanner resolution would otherwise produce a bitmap of hundreds
//! of megapixels.

use crate::error::{DocError, PageError};
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where to find the pdfium shared library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfiumSource {
    /// Let the dynamic loader find it.
    System,
    /// Load `libpdfium` from this directory.
    Directory(PathBuf),
}

impl PdfiumSource {
    /// Pick a source and confirm the library can actually be loaded.
    pub fn probe(dir: Option<&Path>) -> Result<Self, String> {
        let source = match dir {
            Some(dir) => PdfiumSource::Directory(dir.to_path_buf()),
            None => PdfiumSource::System,
        };
        source.bind()?;
        info!("pdfium available ({:?})", source);
        Ok(source)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match self {
            PdfiumSource::System => Pdfium::bind_to_system_library(),
            PdfiumSource::Directory(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
        }
        .map_err(|e| format!("pdfium library could not be loaded: {e:?}"))?;
        Ok(Pdfium::new(bindings))
    }
}

/// One rasterised page; `page_num` is 1-based.
pub struct RenderedPage {
    pub page_num: usize,
    pub image: Result<DynamicImage, PageError>,
}

/// Render every page of `pdf_path`.
///
/// A page that fails to render is reported in its slot; only a document
/// pdfium cannot open at all is an error.
pub async fn render_pages(
    source: &PdfiumSource,
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, DocError> {
    let source = source.clone();
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || render_pages_blocking(&source, &path, max_pixels))
        .await
        .map_err(|e| DocError::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(
    source: &PdfiumSource,
    pdf_path: &Path,
    max_pixels: u32,
) -> Result<Vec<RenderedPage>, DocError> {
    let pdfium = source.bind().map_err(|reason| DocError::OcrUnavailable {
        path: pdf_path.to_path_buf(),
        reason,
    })?;
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| DocError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    info!("Rendering {} pages of '{}'", total, pdf_path.display());

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut rendered = Vec::with_capacity(total);
    for idx in 0..total {
        let page_num = idx + 1;
        let image = match pages.get(idx as u16) {
            Ok(page) => page
                .render_with_config(&render_config)
                .map(|bitmap| bitmap.as_image()),
            Err(e) => Err(e),
        }
        .map_err(|e| PageError::RenderFailed {
            page: page_num,
            detail: format!("{e:?}"),
        });
        if let Ok(img) = &image {
            debug!("Rendered page {} → {}x{} px", page_num, img.width(), img.height());
        }
        rendered.push(RenderedPage { page_num, image });
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_directory_fails_probe() {
        let dir = tempfile::tempdir().unwrap();
        let err = PdfiumSource::probe(Some(dir.path())).unwrap_err();
        assert!(err.contains("pdfium"), "got: {err}");
    }
}
