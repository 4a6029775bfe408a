//! Error types for the ocr-intake library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] is **fatal**: the document cannot be processed at all
//!   (malformed PDF, encrypted file, engine missing, every page failed).
//!   Returned as `Err(IntakeError)` from the [`crate::Pipeline`] entry points.
//!
//! * [`PageError`] is **non-fatal**: OCR failed on a single page but the
//!   rest of the document is fine. Stored inside
//!   [`crate::output::PageResult`] and listed in
//!   [`crate::output::PipelineResult::page_failures`].
//!
//! Every [`IntakeError`] maps to exactly one [`ErrorKind`], which is what
//! crosses the boundary to the HTTP/CLI layer via [`ErrorReport`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// All fatal errors returned by the ocr-intake library.
#[derive(Debug, Error)]
pub enum IntakeError {
    // ── Document errors ───────────────────────────────────────────────────
    /// The bytes are not a readable document of the declared kind.
    #[error("'{source_name}' is not a valid document: {detail}")]
    InvalidDocument { source_name: String, detail: String },

    /// The document is well-formed but uses a feature we cannot process.
    #[error("'{source_name}' cannot be processed: {detail}")]
    UnsupportedDocument { source_name: String, detail: String },

    /// The PDF is encrypted and no password (or a wrong one) was supplied.
    #[error("'{source_name}' is encrypted and requires a password")]
    PasswordRequired { source_name: String },

    // ── Limit errors ──────────────────────────────────────────────────────
    /// Input exceeds the configured byte ceiling.
    #[error("'{source_name}' is {size} bytes, above the {limit}-byte limit")]
    InputTooLarge {
        source_name: String,
        size: usize,
        limit: usize,
    },

    /// Document has more pages than the configured maximum.
    #[error("'{source_name}' has {pages} pages, above the {limit}-page limit")]
    TooManyPages {
        source_name: String,
        pages: usize,
        limit: usize,
    },

    /// Decoding the image would exceed the decoder's memory limits.
    #[error("'{source_name}' is too large to decode: {detail}")]
    DecodeLimitExceeded { source_name: String, detail: String },

    /// Rendered pages would exceed the per-document pixel budget.
    #[error("'{source_name}' needs more than {limit} rendered pixels (reached {pixels})")]
    RenderBudgetExceeded {
        source_name: String,
        pixels: u64,
        limit: u64,
    },

    /// Rasterisation did not finish within the configured timeout.
    #[error("Rasterisation of '{source_name}' timed out after {secs}s")]
    RasterisationTimeout { source_name: String, secs: u64 },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// An engine (OCR binary or pdfium library) could not be located or bound.
    #[error("{engine} is not available: {detail}\n{hint}")]
    EngineUnavailable {
        engine: String,
        detail: String,
        hint: String,
    },

    /// Every page failed OCR; output would be empty.
    #[error("All {total} pages failed OCR.\nFirst error: {first_error}")]
    AllPagesFailed { total: usize, first_error: String },

    /// More pages failed than the configured failure policy tolerates.
    #[error("{failed}/{total} pages failed OCR (tolerated: {tolerated})")]
    TooManyPageFailures {
        failed: usize,
        total: usize,
        tolerated: usize,
    },

    // ── Control errors ────────────────────────────────────────────────────
    /// The caller cancelled the document while it was in flight.
    #[error("Processing of '{source_name}' was cancelled")]
    Cancelled { source_name: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntakeError {
    /// Classify this error into the boundary taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IntakeError::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            IntakeError::UnsupportedDocument { .. } | IntakeError::PasswordRequired { .. } => {
                ErrorKind::UnsupportedDocument
            }
            IntakeError::InputTooLarge { .. }
            | IntakeError::TooManyPages { .. }
            | IntakeError::DecodeLimitExceeded { .. }
            | IntakeError::RenderBudgetExceeded { .. }
            | IntakeError::RasterisationTimeout { .. } => ErrorKind::ResourceExhausted,
            IntakeError::EngineUnavailable { .. } => ErrorKind::EngineUnavailable,
            IntakeError::AllPagesFailed { .. } | IntakeError::TooManyPageFailures { .. } => {
                ErrorKind::Recognition
            }
            IntakeError::Cancelled { .. } => ErrorKind::Cancelled,
            IntakeError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            IntakeError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same input could plausibly succeed.
    ///
    /// Nothing in the document taxonomy is retried automatically; only
    /// cancellation is safe to resubmit unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IntakeError::Cancelled { .. })
    }

    /// Serializable `{ kind, message }` record for the boundary layer.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Taxonomy of fatal failures exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidDocument,
    UnsupportedDocument,
    EngineUnavailable,
    Recognition,
    ResourceExhausted,
    Cancelled,
    InvalidConfig,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidDocument => "invalid_document",
            ErrorKind::UnsupportedDocument => "unsupported_document",
            ErrorKind::EngineUnavailable => "engine_unavailable",
            ErrorKind::Recognition => "recognition",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary form of an [`IntakeError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

/// A non-fatal error for a single page.
///
/// Stored alongside [`crate::output::PageResult`] when a page fails.
/// The document continues unless the failure policy says otherwise.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageError {
    /// The engine ran but reported failure (non-zero exit, crash).
    #[error("Page {page}: recognition failed: {detail}")]
    RecognitionFailed { page: usize, detail: String },

    /// The page image could not be handed to the engine.
    #[error("Page {page}: could not prepare image: {detail}")]
    ImagePreparation { page: usize, detail: String },

    /// The engine did not answer within the per-page timeout.
    #[error("Page {page}: recognition timed out after {secs}s")]
    Timeout { page: usize, secs: u64 },
}

impl PageError {
    /// 1-based ordinal of the failing page.
    pub fn page(&self) -> usize {
        match self {
            PageError::RecognitionFailed { page, .. }
            | PageError::ImagePreparation { page, .. }
            | PageError::Timeout { page, .. } => *page,
        }
    }
}
