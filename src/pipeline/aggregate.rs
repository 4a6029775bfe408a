//! Page aggregation: rasterise a document, OCR every page, join the text.
//!
//! Pages are recognised concurrently (bounded by `config.concurrency`) and
//! complete in any order; results are sorted by ordinal before joining so the
//! document text never depends on scheduling.
//!
//! A page whose OCR fails or times out contributes `""` at its position and
//! is listed in `page_failures`. Whether that fails the whole document is
//! decided by [`crate::config::PageFailurePolicy`].

use crate::config::PipelineConfig;
use crate::document::{DocumentKind, PageImage, SourceDocument};
use crate::error::{IntakeError, PageError};
use crate::output::PageResult;
use crate::pipeline::ocr::OcrEngine;
use crate::pipeline::postprocess;
use crate::pipeline::rasterize::{self, RasterSettings, Rasterizer, RenderBudget};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Joined text and per-page detail for one document.
#[derive(Debug, Clone)]
pub struct AggregatedText {
    pub text: String,
    pub page_count: usize,
    /// One entry per page, ordinals `1..=page_count` ascending.
    pub pages: Vec<PageResult>,
    /// Ordinals of failed pages, ascending.
    pub page_failures: Vec<usize>,
    pub rasterize_duration_ms: u64,
    pub ocr_duration_ms: u64,
}

/// Run the rasterise → OCR → join stages for one document.
pub async fn aggregate(
    doc: &SourceDocument,
    rasterizer: &Arc<dyn Rasterizer>,
    engine: &Arc<dyn OcrEngine>,
    config: &PipelineConfig,
) -> Result<AggregatedText, IntakeError> {
    let render_start = Instant::now();
    let images = page_images(doc, rasterizer, config).await?;
    let rasterize_duration_ms = render_start.elapsed().as_millis() as u64;
    let page_count = images.len();
    info!(
        "'{}': {} page(s) ready in {}ms",
        doc.filename(),
        page_count,
        rasterize_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(page_count);
    }

    let ocr_start = Instant::now();
    let pages = recognize_pages(engine, images, config).await;
    let ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;

    let page_failures: Vec<usize> = pages
        .iter()
        .filter(|p| !p.succeeded())
        .map(|p| p.page_num)
        .collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_document_complete(page_count, page_count - page_failures.len());
    }

    check_failures(&pages, &page_failures, config)?;

    Ok(AggregatedText {
        text: join_pages(&pages),
        page_count,
        pages,
        page_failures,
        rasterize_duration_ms,
        ocr_duration_ms,
    })
}

/// Produce the ordered page images for a document.
///
/// Images skip the rasteriser and become a single page. PDFs are rendered
/// on the blocking pool under `rasterize_timeout_secs`; the result is then
/// checked for the `1..=N` ordinal sequence the rest of the pipeline relies on.
pub async fn page_images(
    doc: &SourceDocument,
    rasterizer: &Arc<dyn Rasterizer>,
    config: &PipelineConfig,
) -> Result<Vec<PageImage>, IntakeError> {
    let settings = RasterSettings::from_config(config, doc.filename());
    let bytes = doc.shared_bytes();
    let secs = config.rasterize_timeout_secs;

    let task = match doc.kind() {
        DocumentKind::Image => {
            debug!("'{}' is an image; skipping rasteriser", doc.filename());
            tokio::task::spawn_blocking(move || {
                rasterize::decode_image(&bytes, &settings).map(|page| vec![page])
            })
        }
        DocumentKind::Pdf => {
            let rasterizer = Arc::clone(rasterizer);
            tokio::task::spawn_blocking(move || rasterizer.rasterize(&bytes, &settings))
        }
    };

    // A timed-out blocking task cannot be interrupted; it runs to completion
    // in the background and its pages are dropped unread.
    let images = match timeout(Duration::from_secs(secs), task).await {
        Err(_) => {
            return Err(IntakeError::RasterisationTimeout {
                source_name: doc.filename().to_string(),
                secs,
            })
        }
        Ok(Err(join_err)) => {
            return Err(IntakeError::Internal(format!(
                "rasterisation task failed: {join_err}"
            )))
        }
        Ok(Ok(result)) => result?,
    };

    if images.len() > config.max_pages {
        return Err(IntakeError::TooManyPages {
            source_name: doc.filename().to_string(),
            pages: images.len(),
            limit: config.max_pages,
        });
    }

    let mut budget = RenderBudget::new(config.max_total_pixels);
    for page in &images {
        budget.charge(page.width(), page.height(), doc.filename())?;
    }

    if let Some((idx, page)) = images
        .iter()
        .enumerate()
        .find(|(idx, page)| page.ordinal != idx + 1)
    {
        return Err(IntakeError::Internal(format!(
            "rasteriser returned page ordinal {} at position {}",
            page.ordinal,
            idx + 1
        )));
    }

    Ok(images)
}

/// OCR every page concurrently and return results sorted by ordinal.
///
/// Never fails as a whole: engine errors and timeouts are recorded on the
/// page's [`PageResult`].
pub async fn recognize_pages(
    engine: &Arc<dyn OcrEngine>,
    images: Vec<PageImage>,
    config: &PipelineConfig,
) -> Vec<PageResult> {
    let total_pages = images.len();
    let secs = config.ocr_timeout_secs;

    let mut results: Vec<PageResult> = stream::iter(images.into_iter().map(|page| {
        let engine = Arc::clone(engine);
        let callback = config.progress_callback.clone();
        async move {
            let page_num = page.ordinal;
            if let Some(ref cb) = callback {
                cb.on_page_start(page_num, total_pages);
            }

            let start = Instant::now();
            let outcome = match timeout(Duration::from_secs(secs), engine.recognize(&page)).await {
                Ok(result) => result,
                Err(_) => Err(PageError::Timeout {
                    page: page_num,
                    secs,
                }),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let result = match outcome {
                Ok(raw) => PageResult {
                    page_num,
                    text: postprocess::clean_page_text(&raw),
                    duration_ms,
                    error: None,
                },
                Err(e) => {
                    warn!("{}", e);
                    PageResult {
                        page_num,
                        text: String::new(),
                        duration_ms,
                        error: Some(e),
                    }
                }
            };

            if let Some(ref cb) = callback {
                match &result.error {
                    None => cb.on_page_complete(page_num, total_pages, result.text.len()),
                    Some(e) => cb.on_page_error(page_num, total_pages, &e.to_string()),
                }
            }
            result
        }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    results.sort_by_key(|p| p.page_num);
    results
}

/// Join page texts with single spaces in ordinal order.
///
/// Failed and blank pages keep their slot as `""`, so `A`, failed, `C`
/// joins to `"A  C"`. A document with no text on any page joins to `""`.
pub fn join_pages(pages: &[PageResult]) -> String {
    if pages.iter().all(|p| p.text.is_empty()) {
        return String::new();
    }
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_failures(
    pages: &[PageResult],
    page_failures: &[usize],
    config: &PipelineConfig,
) -> Result<(), IntakeError> {
    let total = pages.len();
    let failed = page_failures.len();
    if !config.failure_policy.document_fails(failed, total) {
        return Ok(());
    }

    if failed == total {
        let first_error = pages
            .iter()
            .find_map(|p| p.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(IntakeError::AllPagesFailed { total, first_error });
    }

    Err(IntakeError::TooManyPageFailures {
        failed,
        total,
        tolerated: config.failure_policy.tolerated(total),
    })
}
