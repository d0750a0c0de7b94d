//! Rendered page → base64 PNG attachment for the vision model.
//!
//! PNG keeps glyph edges sharp; JPEG ringing around thin strokes measurably
//! hurts transcription of small print. `detail: "high"` asks tiling models to
//! look at the full-resolution tiles instead of a single downscaled overview.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page for the vision API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;
    let encoded = STANDARD.encode(&png);
    debug!("Encoded {}x{} page → {} bytes base64", img.width(), img.height(), encoded.len());
    Ok(ImageData::new(encoded, "image/png").with_detail("high"))
}
