//! Pipeline orchestrator: the library's entry points.
//!
//! A [`Pipeline`] is created once per process with [`Pipeline::initialize`],
//! which resolves and validates both engines. Every later call reuses the
//! resolved engines, so a misconfigured host fails at startup instead of on
//! the first upload.
//!
//! ```rust,no_run
//! use ocr_intake::{DocumentKind, Pipeline, PipelineConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::initialize(PipelineConfig::default()).await?;
//! let bytes = std::fs::read("resume.pdf")?;
//! let result = pipeline
//!     .process_document(bytes, DocumentKind::Pdf, "resume.pdf")
//!     .await?;
//! println!("{:?}", result.fields.emails);
//! # Ok(())
//! # }
//! ```

use crate::config::PipelineConfig;
use crate::document::{DocumentKind, SourceDocument};
use crate::error::IntakeError;
use crate::fields::extract_fields_with;
use crate::output::{PipelineResult, ProcessingStats, Provenance};
use crate::pipeline::aggregate;
use crate::pipeline::ocr::{OcrEngine, TesseractEngine};
use crate::pipeline::rasterize::{PdfiumRasterizer, Rasterizer};
use futures::future::{AbortRegistration, Abortable};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Which engines a [`Pipeline`] resolved at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub ocr_engine: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_version: Option<String>,
    pub rasterizer: String,
    pub language: String,
}

/// Validated engines plus the configuration they were resolved from.
pub struct Pipeline {
    config: PipelineConfig,
    rasterizer: Arc<dyn Rasterizer>,
    engine: Arc<dyn OcrEngine>,
    status: EngineStatus,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("status", &self.status)
            .finish()
    }
}

impl Pipeline {
    /// Resolve and validate both engines.
    ///
    /// Pre-built engines on the config are used as-is. Otherwise tesseract
    /// is probed (`--version`, installed languages) and pdfium is bound.
    ///
    /// # Errors
    /// [`IntakeError::InvalidConfig`] when the config breaks a constraint;
    /// [`IntakeError::EngineUnavailable`] when either engine cannot be used.
    pub async fn initialize(config: PipelineConfig) -> Result<Self, IntakeError> {
        config.validate()?;
        let engine = resolve_engine(&config).await?;
        let rasterizer = resolve_rasterizer(&config).await?;

        let status = EngineStatus {
            ocr_engine: engine.name().to_string(),
            ocr_version: engine.version().map(str::to_string),
            rasterizer: rasterizer.name().to_string(),
            language: config.language.clone(),
        };
        info!(
            "Pipeline ready: ocr={} ({}), rasterizer={}",
            status.ocr_engine,
            status.ocr_version.as_deref().unwrap_or("unknown version"),
            status.rasterizer
        );

        Ok(Self {
            config,
            rasterizer,
            engine,
            status,
        })
    }

    pub fn engine_status(&self) -> &EngineStatus {
        &self.status
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// OCR a document and extract its fields.
    ///
    /// `declared_kind` alone decides the path: images skip the rasteriser.
    /// `filename` is used for diagnostics only.
    ///
    /// # Errors
    /// Any [`IntakeError`] other than `EngineUnavailable`; per-page OCR
    /// failures are reported in [`PipelineResult::page_failures`] unless
    /// the failure policy escalates them.
    pub async fn process_document(
        &self,
        bytes: impl Into<Arc<[u8]>>,
        declared_kind: DocumentKind,
        filename: &str,
    ) -> Result<PipelineResult, IntakeError> {
        let doc = SourceDocument::new(bytes, declared_kind, filename);
        self.process(&doc).await
    }

    /// Same as [`Pipeline::process_document`] for an already-built [`SourceDocument`].
    pub async fn process(&self, doc: &SourceDocument) -> Result<PipelineResult, IntakeError> {
        let total_start = Instant::now();
        info!(
            "Processing '{}' ({}, {} bytes)",
            doc.filename(),
            doc.kind(),
            doc.len()
        );

        if doc.is_empty() {
            return Err(IntakeError::InvalidDocument {
                source_name: doc.filename().to_string(),
                detail: "empty upload".to_string(),
            });
        }
        if doc.len() > self.config.max_input_bytes {
            return Err(IntakeError::InputTooLarge {
                source_name: doc.filename().to_string(),
                size: doc.len(),
                limit: self.config.max_input_bytes,
            });
        }

        let aggregated =
            aggregate::aggregate(doc, &self.rasterizer, &self.engine, &self.config).await?;

        let fields = extract_fields_with(&aggregated.text, &self.config.field_options);

        let failed = aggregated.page_failures.len();
        if failed > 0 {
            warn!(
                "'{}': {}/{} page(s) failed OCR: {:?}",
                doc.filename(),
                failed,
                aggregated.page_count,
                aggregated.page_failures
            );
        }

        let stats = ProcessingStats {
            processed_pages: aggregated.page_count - failed,
            failed_pages: failed,
            rasterize_duration_ms: aggregated.rasterize_duration_ms,
            ocr_duration_ms: aggregated.ocr_duration_ms,
            total_duration_ms: total_start.elapsed().as_millis() as u64,
        };

        info!(
            "'{}' done: {} page(s), {} chars, {}ms",
            doc.filename(),
            aggregated.page_count,
            aggregated.text.len(),
            stats.total_duration_ms
        );

        Ok(PipelineResult {
            document_text: aggregated.text,
            page_count: aggregated.page_count,
            fields,
            page_failures: aggregated.page_failures,
            pages: aggregated.pages,
            provenance: Provenance {
                source_name: doc.filename().to_string(),
                kind: doc.kind(),
                byte_len: doc.len(),
            },
            stats,
        })
    }

    /// [`Pipeline::process`] that stops when the paired
    /// [`futures::future::AbortHandle`] is aborted.
    ///
    /// In-flight OCR processes are killed and their scratch files removed.
    /// A rasterisation already running on the blocking pool finishes on its
    /// own and its pages are discarded.
    ///
    /// ```rust,no_run
    /// use ocr_intake::{AbortHandle, DocumentKind, Pipeline, PipelineConfig, SourceDocument};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let pipeline = Pipeline::initialize(PipelineConfig::default()).await?;
    /// let doc = SourceDocument::new(std::fs::read("scan.png")?, DocumentKind::Image, "scan.png");
    /// let (handle, registration) = AbortHandle::new_pair();
    /// // hand `handle` to whatever notices the client went away
    /// # handle.abort();
    /// let outcome = pipeline.process_document_cancellable(&doc, registration).await;
    /// # let _ = outcome;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn process_document_cancellable(
        &self,
        doc: &SourceDocument,
        registration: AbortRegistration,
    ) -> Result<PipelineResult, IntakeError> {
        match Abortable::new(self.process(doc), registration).await {
            Ok(result) => result,
            Err(_aborted) => {
                info!("'{}' cancelled by caller", doc.filename());
                Err(IntakeError::Cancelled {
                    source_name: doc.filename().to_string(),
                })
            }
        }
    }
}

/// Pre-built engine first, then the tesseract binary from config.
async fn resolve_engine(config: &PipelineConfig) -> Result<Arc<dyn OcrEngine>, IntakeError> {
    if let Some(ref engine) = config.ocr_engine {
        return Ok(Arc::clone(engine));
    }
    let engine = TesseractEngine::probe(config).await?;
    Ok(Arc::new(engine))
}

/// Pre-built rasteriser first, then pdfium from `pdfium_lib_path` or the
/// system library.
async fn resolve_rasterizer(config: &PipelineConfig) -> Result<Arc<dyn Rasterizer>, IntakeError> {
    if let Some(ref rasterizer) = config.rasterizer {
        return Ok(Arc::clone(rasterizer));
    }
    let lib_path = config.pdfium_lib_path.clone();
    let rasterizer = tokio::task::spawn_blocking(move || PdfiumRasterizer::bind(lib_path.as_deref()))
        .await
        .map_err(|e| IntakeError::Internal(format!("pdfium bind task failed: {e}")))??;
    Ok(Arc::new(rasterizer))
}
