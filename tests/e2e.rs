//! End-to-end tests against the real engines.
//!
//! These need a `tesseract` binary with `eng` traineddata and a pdfium
//! shared library. They are gated behind the `E2E_ENABLED` environment
//! variable so they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture

use image::{DynamicImage, ImageFormat, Luma, Rgb, RgbImage};
use ocr_intake::pipeline::postprocess::clean_page_text;
use ocr_intake::{
    DocumentKind, ErrorKind, OcrEngine, PageImage, PdfiumRasterizer, Pipeline, PipelineConfig,
    RasterSettings, Rasterizer, TesseractEngine,
};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

/// Skip this test unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
    };
}

fn pdfium_lib_path() -> Option<PathBuf> {
    std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from)
}

/// Bind pdfium or skip the calling test.
macro_rules! pdfium_or_skip {
    () => {
        match PdfiumRasterizer::bind(pdfium_lib_path().as_deref()) {
            Ok(r) => r,
            Err(e) => {
                println!("SKIP — pdfium unavailable: {e}");
                return;
            }
        }
    };
}

/// Smallest useful PDF: one blank 200×200pt page. No xref table; pdfium
/// rebuilds it on load.
const BLANK_PDF: &[u8] = b"%PDF-1.4\n\
1 0 obj <</Type /Catalog /Pages 2 0 R>> endobj\n\
2 0 obj <</Type /Pages /Kids [3 0 R] /Count 1>> endobj\n\
3 0 obj <</Type /Page /Parent 2 0 R /MediaBox [0 0 200 200]>> endobj\n\
trailer <</Root 1 0 R>>\n\
%%EOF\n";

fn blank_png() -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(600, 400, Rgb([255, 255, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .expect("encode png");
    buf
}

// ── Tesseract ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tesseract_probe() {
    e2e_skip_unless_enabled!();

    let engine = TesseractEngine::probe(&PipelineConfig::default())
        .await
        .expect("tesseract with eng data should be installed");
    let version = engine.version().unwrap_or_default();
    println!("probed: {version}");
    assert!(version.to_lowercase().contains("tesseract"), "got: {version}");
}

#[tokio::test]
async fn test_tesseract_rejects_missing_language() {
    e2e_skip_unless_enabled!();

    let config = PipelineConfig::builder()
        .language("eng+zzz")
        .build()
        .unwrap();
    let err = TesseractEngine::probe(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
    assert!(err.to_string().contains("zzz"), "got: {err}");
}

#[tokio::test]
async fn test_tesseract_blank_page_is_empty() {
    e2e_skip_unless_enabled!();

    let engine = TesseractEngine::probe(&PipelineConfig::default()).await.unwrap();
    let page = PageImage::new(
        1,
        DynamicImage::ImageLuma8(image::GrayImage::from_pixel(400, 300, Luma([255]))),
        300,
    );
    let raw = engine.recognize(&page).await.expect("blank page is not an error");
    assert_eq!(clean_page_text(&raw), "", "raw output: {raw:?}");
}

// ── pdfium ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pdfium_renders_blank_pdf() {
    e2e_skip_unless_enabled!();
    let rasterizer = pdfium_or_skip!();

    let config = PipelineConfig::default();
    let settings = RasterSettings::from_config(&config, "blank.pdf");
    let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(BLANK_PDF, &settings))
        .await
        .unwrap()
        .expect("blank PDF should render");

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].ordinal, 1);
    // 200pt at 300 DPI
    assert!((830..=836).contains(&pages[0].width()), "width {}", pages[0].width());
}

#[tokio::test]
async fn test_pdfium_renders_grayscale_within_budget() {
    e2e_skip_unless_enabled!();
    let rasterizer = pdfium_or_skip!();

    let settings = RasterSettings::from_config(&PipelineConfig::default(), "blank.pdf");
    let pages = tokio::task::spawn_blocking(move || rasterizer.rasterize(BLANK_PDF, &settings))
        .await
        .unwrap()
        .expect("blank PDF should render");
    assert!(matches!(pages[0].image, DynamicImage::ImageLuma8(_)));
}

#[tokio::test]
async fn test_pdfium_stops_at_pixel_budget() {
    e2e_skip_unless_enabled!();
    let rasterizer = pdfium_or_skip!();

    let config = PipelineConfig::builder()
        .max_total_pixels(10_000)
        .build()
        .unwrap();
    let settings = RasterSettings::from_config(&config, "blank.pdf");
    let err = tokio::task::spawn_blocking(move || rasterizer.rasterize(BLANK_PDF, &settings))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    assert!(err.to_string().contains("10000"), "got: {err}");
}

#[tokio::test]
async fn test_pdfium_rejects_garbage() {
    e2e_skip_unless_enabled!();
    let rasterizer = pdfium_or_skip!();

    let settings = RasterSettings::from_config(&PipelineConfig::default(), "garbage.pdf");
    let err = tokio::task::spawn_blocking(move || {
        rasterizer.rasterize(b"this is not a pdf at all", &settings)
    })
    .await
    .unwrap()
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDocument);
}

// ── Full pipeline ────────────────────────────────────────────────────────────

async fn live_pipeline() -> Option<Pipeline> {
    let rasterizer = match PdfiumRasterizer::bind(pdfium_lib_path().as_deref()) {
        Ok(r) => r,
        Err(e) => {
            println!("SKIP — pdfium unavailable: {e}");
            return None;
        }
    };
    let config = PipelineConfig::builder()
        .rasterizer(Arc::new(rasterizer))
        .build()
        .unwrap();
    Some(Pipeline::initialize(config).await.expect("tesseract should be installed"))
}

#[tokio::test]
async fn test_pipeline_blank_image() {
    e2e_skip_unless_enabled!();
    let Some(pipeline) = live_pipeline().await else {
        return;
    };

    let result = pipeline
        .process_document(blank_png(), DocumentKind::Image, "blank.png")
        .await
        .expect("blank image succeeds");
    assert_eq!(result.page_count, 1);
    assert_eq!(result.document_text, "");
    assert!(result.page_failures.is_empty());
    assert!(result.fields.is_empty());
}

#[tokio::test]
async fn test_pipeline_blank_pdf() {
    e2e_skip_unless_enabled!();
    let Some(pipeline) = live_pipeline().await else {
        return;
    };

    let result = pipeline
        .process_document(BLANK_PDF, DocumentKind::Pdf, "blank.pdf")
        .await
        .expect("blank pdf succeeds");
    assert_eq!(result.page_count, 1);
    assert_eq!(result.document_text, "");
    println!(
        "rasterise {}ms, ocr {}ms",
        result.stats.rasterize_duration_ms, result.stats.ocr_duration_ms
    );
}

#[tokio::test]
async fn test_pipeline_png_declared_as_pdf_is_invalid() {
    e2e_skip_unless_enabled!();
    let Some(pipeline) = live_pipeline().await else {
        return;
    };

    let err = pipeline
        .process_document(blank_png(), DocumentKind::Pdf, "mislabelled.pdf")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidDocument);
}
