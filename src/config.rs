//! Configuration types for document OCR.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built
//! via its [`PipelineConfigBuilder`]. Engine locations (tesseract binary,
//! pdfium library) live here too; [`crate::Pipeline::initialize`] validates
//! them once and keeps the resolved engines for every later call.

use crate::error::IntakeError;
use crate::fields::FieldOptions;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::rasterize::Rasterizer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Upload ceiling enforced upstream; inputs above it are refused outright.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 16 * 1024 * 1024;

/// Rendered pixels allowed per document before rasterisation is refused.
pub const DEFAULT_MAX_TOTAL_PIXELS: u64 = 500_000_000;

/// Configuration for the OCR pipeline.
///
/// Built via [`PipelineConfig::builder()`] or using
/// [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr_intake::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(300)
///     .concurrency(4)
///     .language("eng+deu")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// Tesseract is tuned for roughly 300 DPI input; glyphs rendered much
    /// smaller than that lose accuracy quickly.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 4000.
    ///
    /// Caps the longest edge regardless of physical page size so a poster-
    /// sized page cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Pixel budget for all pages of one document, summed as width × height.
    /// Default: 500 million.
    ///
    /// Rendering stops with a resource error once the running total passes
    /// this budget, bounding memory for long documents.
    pub max_total_pixels: u64,

    /// Number of pages OCRed concurrently. Default: 4.
    pub concurrency: usize,

    /// Largest accepted input in bytes. Default: 16 MiB.
    pub max_input_bytes: usize,

    /// Largest accepted page count. Default: 500.
    pub max_pages: usize,

    /// Per-page OCR timeout in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Timeout for rasterising the whole document, in seconds. Default: 120.
    pub rasterize_timeout_secs: u64,

    /// Tesseract language code(s), e.g. "eng" or "eng+fra". Default: "eng".
    pub language: String,

    /// Tesseract page segmentation mode (`--psm`). Default: 3 (fully automatic).
    pub page_segmentation: u8,

    /// Path or name of the tesseract binary. Default: "tesseract" (looked up on PATH).
    pub tesseract_path: PathBuf,

    /// Path to a pdfium shared library. If None, the system library is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// When a document as a whole counts as failed. Default: all pages failed.
    pub failure_policy: PageFailurePolicy,

    /// Options passed to the field extractor.
    pub field_options: FieldOptions,

    /// Pre-constructed OCR engine. Takes precedence over `tesseract_path`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Pre-constructed rasteriser. Takes precedence over `pdfium_lib_path`.
    pub rasterizer: Option<Arc<dyn Rasterizer>>,

    /// Receives per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 4000,
            max_total_pixels: DEFAULT_MAX_TOTAL_PIXELS,
            concurrency: 4,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_pages: 500,
            ocr_timeout_secs: 60,
            rasterize_timeout_secs: 120,
            language: "eng".to_string(),
            page_segmentation: 3,
            tesseract_path: PathBuf::from("tesseract"),
            pdfium_lib_path: None,
            password: None,
            failure_policy: PageFailurePolicy::default(),
            field_options: FieldOptions::default(),
            ocr_engine: None,
            rasterizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("max_total_pixels", &self.max_total_pixels)
            .field("concurrency", &self.concurrency)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("max_pages", &self.max_pages)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("rasterize_timeout_secs", &self.rasterize_timeout_secs)
            .field("language", &self.language)
            .field("page_segmentation", &self.page_segmentation)
            .field("tesseract_path", &self.tesseract_path)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("failure_policy", &self.failure_policy)
            .field("field_options", &self.field_options)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|e| e.name().to_string()))
            .field("rasterizer", &self.rasterizer.as_ref().map(|r| r.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check every numeric and textual constraint.
    ///
    /// Fields are public, so [`crate::Pipeline::initialize`] runs this again
    /// on whatever it is handed, not only on builder output.
    pub fn validate(&self) -> Result<(), IntakeError> {
        if self.dpi < 72 || self.dpi > 600 {
            return Err(IntakeError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                self.dpi
            )));
        }
        if self.concurrency == 0 {
            return Err(IntakeError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if self.max_rendered_pixels == 0 || self.max_total_pixels == 0 {
            return Err(IntakeError::InvalidConfig("Pixel limits must be ≥ 1".into()));
        }
        if self.max_input_bytes == 0 || self.max_pages == 0 {
            return Err(IntakeError::InvalidConfig(
                "Input byte and page limits must be ≥ 1".into(),
            ));
        }
        if self.ocr_timeout_secs == 0 || self.rasterize_timeout_secs == 0 {
            return Err(IntakeError::InvalidConfig("Timeouts must be ≥ 1s".into()));
        }
        if self.page_segmentation > 13 {
            return Err(IntakeError::InvalidConfig(format!(
                "Page segmentation mode must be 0–13, got {}",
                self.page_segmentation
            )));
        }
        if self.language.trim().is_empty()
            || !self
                .language
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '+')
        {
            return Err(IntakeError::InvalidConfig(format!(
                "Invalid OCR language '{}'",
                self.language
            )));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn max_total_pixels(mut self, px: u64) -> Self {
        self.config.max_total_pixels = px;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_input_bytes(mut self, n: usize) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn max_pages(mut self, n: usize) -> Self {
        self.config.max_pages = n;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn rasterize_timeout_secs(mut self, secs: u64) -> Self {
        self.config.rasterize_timeout_secs = secs;
        self
    }

    pub fn language(mut self, lang: impl Into<String>) -> Self {
        self.config.language = lang.into();
        self
    }

    pub fn page_segmentation(mut self, psm: u8) -> Self {
        self.config.page_segmentation = psm;
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn failure_policy(mut self, policy: PageFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    pub fn dedupe_fields(mut self, v: bool) -> Self {
        self.config.field_options.dedupe = v;
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, IntakeError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// When per-page OCR failures turn into a whole-document failure.
///
/// A zero-page document never fails under any policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Fail only when every page failed. (default)
    #[default]
    AllPages,
    /// Fail as soon as any page failed.
    AnyPage,
    /// Fail when more than this many pages failed (and always when all did).
    MoreThan(usize),
}

impl PageFailurePolicy {
    /// Whether `failed` failures out of `total` pages fail the document.
    pub fn document_fails(&self, failed: usize, total: usize) -> bool {
        if total == 0 || failed == 0 {
            return false;
        }
        if failed == total {
            return true;
        }
        match self {
            PageFailurePolicy::AllPages => false,
            PageFailurePolicy::AnyPage => true,
            PageFailurePolicy::MoreThan(n) => failed > *n,
        }
    }

    /// How many failures this policy tolerates for a `total`-page document.
    pub fn tolerated(&self, total: usize) -> usize {
        match self {
            PageFailurePolicy::AllPages => total.saturating_sub(1),
            PageFailurePolicy::AnyPage => 0,
            PageFailurePolicy::MoreThan(n) => (*n).min(total.saturating_sub(1)),
        }
    }
}
