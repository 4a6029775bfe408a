//! Pipeline stages for document OCR.
//!
//! Each submodule implements one transformation step and can be tested on
//! its own. Engines sit behind traits so either backend can be replaced
//! without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ rasterize ──▶ ocr ──▶ postprocess ──▶ aggregate
//!          (pdfium/image) (tesseract) (cleanup)   (ordered join)
//! ```
//!
//! 1. [`rasterize`]: render PDF pages (or decode an uploaded image) into
//!    page images; blocking, so the aggregator runs it in `spawn_blocking`
//! 2. [`ocr`]: recognise text on one page via the tesseract binary
//! 3. [`postprocess`]: deterministic cleanup of raw engine output
//! 4. [`aggregate`]: drive 1–3 over every page with bounded concurrency and
//!    join the results in ordinal order

pub mod aggregate;
pub mod ocr;
pub mod postprocess;
pub mod rasterize;
