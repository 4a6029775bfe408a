//! Rasterisation: turn PDF bytes (or an uploaded image) into page images.
//!
//! [`Rasterizer`] is the seam between the aggregator and a concrete
//! renderer; [`PdfiumRasterizer`] is the production implementation and
//! tests substitute synthetic pages.
//!
//! pdfium is not async-safe, so [`Rasterizer::rasterize`] is a plain
//! blocking call. The aggregator runs it inside `spawn_blocking` under a
//! timeout. Every pdfium handle is scoped to that one call: the document
//! and the bindings are dropped before it returns, on success or failure.

use crate::config::PipelineConfig;
use crate::document::PageImage;
use crate::error::IntakeError;
use image::{imageops::FilterType, DynamicImage, ImageError, ImageReader, Limits};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything a rasteriser needs besides the bytes.
#[derive(Debug, Clone)]
pub struct RasterSettings {
    /// Filename used in error messages.
    pub source_name: String,
    pub dpi: u32,
    pub max_rendered_pixels: u32,
    /// Pixel budget across all pages of the document.
    pub max_total_pixels: u64,
    pub max_pages: usize,
    pub password: Option<String>,
}

impl RasterSettings {
    pub fn from_config(config: &PipelineConfig, source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            dpi: config.dpi,
            max_rendered_pixels: config.max_rendered_pixels,
            max_total_pixels: config.max_total_pixels,
            max_pages: config.max_pages,
            password: config.password.clone(),
        }
    }
}

/// Running total of rendered pixels for one document.
///
/// Every page is charged `width × height` as it is produced; the charge
/// that takes the total past `max_total_pixels` fails.
#[derive(Debug, Clone)]
pub struct RenderBudget {
    used: u64,
    limit: u64,
}

impl RenderBudget {
    pub fn new(limit: u64) -> Self {
        Self { used: 0, limit }
    }

    /// Pixels charged so far.
    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn charge(&mut self, width: u32, height: u32, source_name: &str) -> Result<(), IntakeError> {
        let pixels = self
            .used
            .saturating_add(u64::from(width) * u64::from(height));
        if pixels > self.limit {
            return Err(IntakeError::RenderBudgetExceeded {
                source_name: source_name.to_string(),
                pixels,
                limit: self.limit,
            });
        }
        self.used = pixels;
        Ok(())
    }
}

/// Converts a PDF byte stream into an ordered, fully materialised list of pages.
///
/// Implementations must return pages with ordinals `1..=N` in document
/// order and must classify failures as [`IntakeError::InvalidDocument`],
/// [`IntakeError::UnsupportedDocument`] / [`IntakeError::PasswordRequired`],
/// or one of the resource-limit variants.
pub trait Rasterizer: Send + Sync {
    /// Short identifier used in logs and engine status.
    fn name(&self) -> &str;

    fn rasterize(&self, pdf: &[u8], settings: &RasterSettings) -> Result<Vec<PageImage>, IntakeError>;
}

// ── pdfium backend ───────────────────────────────────────────────────────

/// Where the pdfium shared library comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfiumLibrary {
    /// Let the dynamic loader find it (LD_LIBRARY_PATH, system dirs).
    System,
    /// An explicit library file, or a directory containing the platform library.
    Path(PathBuf),
}

/// [`Rasterizer`] backed by pdfium-render.
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    library: PdfiumLibrary,
}

impl PdfiumRasterizer {
    /// Locate and bind pdfium once, failing fast when it cannot be loaded.
    ///
    /// The resolved location is kept so later calls bind without any
    /// further lookup.
    pub fn bind(lib_path: Option<&Path>) -> Result<Self, IntakeError> {
        let library = match lib_path {
            Some(p) if p.is_dir() => PdfiumLibrary::Path(Pdfium::pdfium_platform_library_name_at_path(p)),
            Some(p) => PdfiumLibrary::Path(p.to_path_buf()),
            None => PdfiumLibrary::System,
        };
        let rasterizer = Self { library };
        rasterizer.load()?;
        info!("pdfium bound from {:?}", rasterizer.library);
        Ok(rasterizer)
    }

    pub fn library(&self) -> &PdfiumLibrary {
        &self.library
    }

    fn load(&self) -> Result<Pdfium, IntakeError> {
        let bindings = match &self.library {
            PdfiumLibrary::Path(path) => Pdfium::bind_to_library(path),
            PdfiumLibrary::System => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| IntakeError::EngineUnavailable {
            engine: "pdfium".to_string(),
            detail: format!("{:?}", e),
            hint: "Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium on the library path."
                .to_string(),
        })?;
        Ok(Pdfium::new(bindings))
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn name(&self) -> &str {
        "pdfium"
    }

    fn rasterize(&self, pdf: &[u8], settings: &RasterSettings) -> Result<Vec<PageImage>, IntakeError> {
        let pdfium = self.load()?;

        let document = pdfium
            .load_pdf_from_byte_slice(pdf, settings.password.as_deref())
            .map_err(|e| classify_load_error(e, settings))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF '{}' loaded: {} pages", settings.source_name, total_pages);

        if total_pages > settings.max_pages {
            return Err(IntakeError::TooManyPages {
                source_name: settings.source_name.clone(),
                pages: total_pages,
                limit: settings.max_pages,
            });
        }

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(settings.dpi as f32 / 72.0)
            .set_maximum_width(settings.max_rendered_pixels as i32)
            .set_maximum_height(settings.max_rendered_pixels as i32);

        let mut results = Vec::with_capacity(total_pages);
        let mut budget = RenderBudget::new(settings.max_total_pixels);

        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                IntakeError::InvalidDocument {
                    source_name: settings.source_name.clone(),
                    detail: format!("page {} could not be rendered: {:?}", idx + 1, e),
                }
            })?;

            budget.charge(
                bitmap.width() as u32,
                bitmap.height() as u32,
                &settings.source_name,
            )?;

            // One byte per pixel.
            let image = DynamicImage::ImageLuma8(bitmap.as_image().into_luma8());
            debug!(
                "Rendered page {} → {}x{} px ({} px so far)",
                idx + 1,
                image.width(),
                image.height(),
                budget.used()
            );

            results.push(PageImage::new(idx + 1, image, settings.dpi));
        }

        Ok(results)
    }
}

fn classify_load_error(err: PdfiumError, settings: &RasterSettings) -> IntakeError {
    let err_str = format!("{:?}", err);
    if err_str.contains("Password") || err_str.contains("password") {
        if settings.password.is_some() {
            IntakeError::UnsupportedDocument {
                source_name: settings.source_name.clone(),
                detail: "the supplied password was rejected".to_string(),
            }
        } else {
            IntakeError::PasswordRequired {
                source_name: settings.source_name.clone(),
            }
        }
    } else if err_str.contains("Security") {
        IntakeError::UnsupportedDocument {
            source_name: settings.source_name.clone(),
            detail: format!("unsupported security handler: {}", err_str),
        }
    } else {
        IntakeError::InvalidDocument {
            source_name: settings.source_name.clone(),
            detail: err_str,
        }
    }
}

// ── Image uploads ────────────────────────────────────────────────────────

/// Decode an uploaded image into the single page of an image-kind document.
///
/// Images larger than `max_rendered_pixels` on either edge are scaled down
/// proportionally, matching the cap applied to rendered PDF pages.
pub fn decode_image(bytes: &[u8], settings: &RasterSettings) -> Result<PageImage, IntakeError> {
    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| IntakeError::InvalidDocument {
            source_name: settings.source_name.clone(),
            detail: e.to_string(),
        })?;
    if reader.format().is_none() {
        return Err(IntakeError::InvalidDocument {
            source_name: settings.source_name.clone(),
            detail: "unrecognised image data".to_string(),
        });
    }
    reader.limits(Limits::default());

    let image = reader
        .decode()
        .map_err(|e| classify_image_error(e, settings))?;

    let max = settings.max_rendered_pixels;
    let image = if image.width() > max || image.height() > max {
        debug!(
            "Scaling {}x{} upload down to fit {} px",
            image.width(),
            image.height(),
            max
        );
        image.resize(max, max, FilterType::Triangle)
    } else {
        image
    };
    RenderBudget::new(settings.max_total_pixels).charge(
        image.width(),
        image.height(),
        &settings.source_name,
    )?;

    Ok(PageImage::new(1, image, settings.dpi))
}

fn classify_image_error(err: ImageError, settings: &RasterSettings) -> IntakeError {
    let source_name = settings.source_name.clone();
    match err {
        ImageError::Limits(e) => IntakeError::DecodeLimitExceeded {
            source_name,
            detail: e.to_string(),
        },
        ImageError::Unsupported(e) => IntakeError::UnsupportedDocument {
            source_name,
            detail: e.to_string(),
        },
        other => IntakeError::InvalidDocument {
            source_name,
            detail: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use image::{ImageFormat, Rgb, RgbImage};

    fn settings(max_px: u32) -> RasterSettings {
        RasterSettings {
            source_name: "upload.png".into(),
            dpi: 300,
            max_rendered_pixels: max_px,
            max_total_pixels: 1_000_000,
            max_pages: 10,
            password: None,
        }
    }

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([255, 255, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode should succeed");
        buf
    }

    #[test]
    fn decode_image_is_single_first_page() {
        let page = decode_image(&png_bytes(20, 10), &settings(1000)).expect("decode");
        assert_eq!(page.ordinal, 1);
        assert_eq!((page.width(), page.height()), (20, 10));
        assert_eq!(page.dpi, 300);
    }

    #[test]
    fn decode_image_caps_longest_edge() {
        let page = decode_image(&png_bytes(400, 200), &settings(100)).expect("decode");
        assert_eq!(page.width(), 100);
        assert_eq!(page.height(), 50);
    }

    #[test]
    fn garbage_bytes_are_invalid_document() {
        let err = decode_image(b"definitely not an image", &settings(1000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDocument);
        assert!(err.to_string().contains("upload.png"));
    }

    #[test]
    fn render_budget_accumulates_across_pages() {
        let mut budget = RenderBudget::new(250);
        assert!(budget.charge(10, 10, "cv.pdf").is_ok());
        assert!(budget.charge(10, 10, "cv.pdf").is_ok());
        assert_eq!(budget.used(), 200);

        let err = budget.charge(10, 10, "cv.pdf").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert!(matches!(
            err,
            IntakeError::RenderBudgetExceeded { pixels: 300, limit: 250, .. }
        ));
        assert_eq!(budget.used(), 200);
    }

    #[test]
    fn render_budget_allows_exact_fit() {
        let mut budget = RenderBudget::new(100);
        assert!(budget.charge(10, 10, "cv.pdf").is_ok());
        assert!(budget.charge(1, 1, "cv.pdf").is_err());
    }

    #[test]
    fn decode_image_respects_pixel_budget() {
        let mut s = settings(1000);
        s.max_total_pixels = 100;
        let err = decode_image(&png_bytes(20, 10), &s).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn settings_follow_config() {
        let config = PipelineConfig::builder()
            .dpi(200)
            .max_pages(7)
            .max_total_pixels(1234)
            .password("pw")
            .build()
            .unwrap();
        let s = RasterSettings::from_config(&config, "cv.pdf");
        assert_eq!(s.source_name, "cv.pdf");
        assert_eq!(s.dpi, 200);
        assert_eq!(s.max_pages, 7);
        assert_eq!(s.max_total_pixels, 1234);
        assert_eq!(s.password.as_deref(), Some("pw"));
    }
}
