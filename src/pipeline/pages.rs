//! Page loading: turn the resolved input into page images.
//!
//! PDFs are rasterised with pdfium; a raster image input becomes a single
//! page. Both paths run inside `spawn_blocking` because pdfium and image
//! decoding are CPU-bound and pdfium keeps thread-local state.
//!
//! Pages are rendered at `dpi`, then capped so the longest edge never
//! exceeds `max_rendered_pixels`; a poster-sized page would otherwise blow
//! up memory and the VLM's image budget.

use crate::config::ConversionConfig;
use crate::error::Pdf2TexError;
use crate::pipeline::input::{ResolvedInput, SourceKind};
use image::imageops::FilterType;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Env var pointing at the pdfium shared library or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Load every page of the input as an image, in page order.
pub async fn load_pages(
    input: &ResolvedInput,
    config: &ConversionConfig,
) -> Result<Vec<DynamicImage>, Pdf2TexError> {
    let path = input.path().to_path_buf();
    let kind = input.kind();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    let pages = tokio::task::spawn_blocking(move || match kind {
        SourceKind::Pdf => render_pdf_blocking(&path, dpi, max_pixels, password.as_deref()),
        SourceKind::Image => load_image_blocking(&path, max_pixels).map(|img| vec![img]),
    })
    .await
    .map_err(|e| Pdf2TexError::Internal(format!("Page loading task panicked: {}", e)))??;

    if pages.is_empty() {
        return Err(Pdf2TexError::EmptyDocument {
            path: input.path().to_path_buf(),
        });
    }
    Ok(pages)
}

/// Bind pdfium from `PDFIUM_LIB_PATH` when set, else from the system
/// library search path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2TexError> {
    let bindings = match std::env::var_os(PDFIUM_LIB_PATH_ENV) {
        Some(configured) => {
            let configured = PathBuf::from(configured);
            let lib = if configured.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&configured)
            } else {
                configured
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2TexError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_pdf_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
) -> Result<Vec<DynamicImage>, Pdf2TexError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium
        .load_pdf_from_file(pdf_path, password)
        .map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    Pdf2TexError::WrongPassword {
                        path: pdf_path.to_path_buf(),
                    }
                } else {
                    Pdf2TexError::PasswordRequired {
                        path: pdf_path.to_path_buf(),
                    }
                }
            } else {
                Pdf2TexError::CorruptPdf {
                    path: pdf_path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            Pdf2TexError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }

    Ok(images)
}

fn load_image_blocking(path: &Path, max_pixels: u32) -> Result<DynamicImage, Pdf2TexError> {
    let img = image::open(path).map_err(|e| Pdf2TexError::ImageDecodeFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;
    info!("Image loaded: {}x{} px", img.width(), img.height());
    Ok(fit_within(img, max_pixels))
}

/// Downscale so the longest edge is at most `max_pixels`, keeping aspect.
pub(crate) fn fit_within(img: DynamicImage, max_pixels: u32) -> DynamicImage {
    if img.width().max(img.height()) <= max_pixels {
        return img;
    }
    let resized = img.resize(max_pixels, max_pixels, FilterType::Lanczos3);
    debug!(
        "Downscaled image {}x{} → {}x{}",
        img.width(),
        img.height(),
        resized.width(),
        resized.height()
    );
    resized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::resolve_input;
    use image::{Rgb, RgbImage};

    #[test]
    fn small_images_are_untouched() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(100, 50));
        let out = fit_within(img, 2000);
        assert_eq!((out.width(), out.height()), (100, 50));
    }

    #[test]
    fn large_images_keep_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4000, 1000));
        let out = fit_within(img, 2000);
        assert_eq!((out.width(), out.height()), (2000, 500));
    }

    #[tokio::test]
    async fn image_input_is_a_single_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        RgbImage::from_pixel(30, 20, Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        let pages = load_pages(&resolved, &ConversionConfig::default()).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!((pages[0].width(), pages[0].height()), (30, 20));
    }

    #[tokio::test]
    async fn undecodable_image_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), 5).await.unwrap();
        let err = load_pages(&resolved, &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Pdf2TexError::ImageDecodeFailed { .. }));
    }
}
