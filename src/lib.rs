//! # ocr-intake
//!
//! OCR uploaded PDFs and images, then pull contact fields out of the text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes + declared kind
//!  │
//!  ├─ 1. Rasterise  pdfium renders every page (images skip this step)
//!  ├─ 2. OCR        tesseract per page, bounded concurrency, per-page timeout
//!  ├─ 3. Clean      normalise whitespace and strip control characters
//!  ├─ 4. Join       page texts in page order, separated by single spaces
//!  └─ 5. Extract    name, e-mails, phones, LinkedIn reference
//! ```
//!
//! A page that fails OCR leaves an empty slot and is listed in
//! [`PipelineResult::page_failures`]; the document only fails when the
//! [`PageFailurePolicy`] says so (by default, when every page failed).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_intake::{DocumentKind, Pipeline, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Probes tesseract and binds pdfium once; fails fast if either is missing.
//!     let pipeline = Pipeline::initialize(PipelineConfig::default()).await?;
//!
//!     let bytes = std::fs::read("resume.pdf")?;
//!     let result = pipeline
//!         .process_document(bytes, DocumentKind::Pdf, "resume.pdf")
//!         .await?;
//!
//!     println!("{}", serde_json::to_string_pretty(&result.fields)?);
//!     Ok(())
//! }
//! ```
//!
//! Field extraction works on any text and needs no engines:
//!
//! ```rust
//! let fields = ocr_intake::extract_fields("Jane Doe\njane@example.com");
//! assert_eq!(fields.name.as_deref(), Some("Jane Doe"));
//! assert_eq!(fields.emails, vec!["jane@example.com"]);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr-intake` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! ## Runtime requirements
//!
//! * `tesseract` on `PATH` (or [`PipelineConfigBuilder::tesseract_path`])
//!   with traineddata for every configured language.
//! * A pdfium shared library on the loader path (or
//!   [`PipelineConfigBuilder::pdfium_lib_path`]).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod fields;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    PageFailurePolicy, PipelineConfig, PipelineConfigBuilder, DEFAULT_MAX_INPUT_BYTES,
    DEFAULT_MAX_TOTAL_PIXELS,
};
pub use document::{DocumentKind, PageImage, SourceDocument};
pub use error::{ErrorKind, ErrorReport, IntakeError, PageError};
pub use fields::{extract_fields, extract_fields_with, ExtractedFields, FieldOptions};
pub use futures::future::{AbortHandle, AbortRegistration};
pub use output::{format_file_size, PageResult, PipelineResult, ProcessingStats, Provenance};
pub use pipeline::ocr::{OcrEngine, TesseractEngine};
pub use pipeline::rasterize::{PdfiumRasterizer, RasterSettings, Rasterizer, RenderBudget};
pub use process::{EngineStatus, Pipeline};
pub use progress::{NoopProgressCallback, OcrProgressCallback, ProgressCallback};
