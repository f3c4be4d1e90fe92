//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! PNG keeps rendered text crisp; `detail: "high"` lets GPT-4-class models
//! tile the page instead of reading a single low-resolution overview, which
//! matters for spotting small figures.

use crate::error::Pdf2TexError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode one page as a base64 PNG ready for the VLM API.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode every page, keeping page order.
pub fn encode_pages(pages: &[DynamicImage]) -> Result<Vec<ImageData>, Pdf2TexError> {
    pages
        .iter()
        .enumerate()
        .map(|(i, img)| {
            encode_page(img).map_err(|e| Pdf2TexError::RasterisationFailed {
                page: i + 1,
                detail: format!("PNG encoding failed: {e}"),
            })
        })
        .collect()
}
