//! Input-side data model: what the caller hands us and what the
//! rasteriser hands the OCR engine.

use crate::error::IntakeError;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Declared kind of an uploaded document.
///
/// The kind alone decides the processing path; file contents are never
/// sniffed beyond what the rasteriser and image decoder validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "gif", "webp"];

impl DocumentKind {
    /// Map a file extension (without the dot, any case) to a kind.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if ext == "pdf" {
            Some(DocumentKind::Pdf)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(DocumentKind::Image)
        } else {
            None
        }
    }

    /// Derive the declared kind from an upload's filename.
    ///
    /// Convenience for the upload layer; the core itself only ever sees the
    /// resulting kind.
    pub fn from_filename(filename: &str) -> Result<Self, IntakeError> {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| IntakeError::UnsupportedDocument {
                source_name: filename.to_string(),
                detail: "only PDF and image uploads (png, jpg, jpeg, tif, tiff, bmp, gif, webp) can be OCRed"
                    .to_string(),
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image => "image",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable input to one pipeline invocation.
///
/// The byte buffer is reference-counted so the blocking rasteriser thread
/// can read it without copying.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Arc<[u8]>,
    kind: DocumentKind,
    filename: String,
}

impl SourceDocument {
    pub fn new(bytes: impl Into<Arc<[u8]>>, kind: DocumentKind, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            kind,
            filename: filename.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Original filename; used in diagnostics only.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One rasterised page, ready for OCR.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based position in the document.
    pub ordinal: usize,
    pub image: DynamicImage,
    /// Resolution the page was rendered at (or the nominal DPI for
    /// image uploads, which carry no reliable physical size).
    pub dpi: u32,
}

impl PageImage {
    pub fn new(ordinal: usize, image: DynamicImage, dpi: u32) -> Self {
        Self {
            ordinal,
            image,
            dpi,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("cv.PDF").unwrap(), DocumentKind::Pdf);
        assert_eq!(DocumentKind::from_filename("scan.jpeg").unwrap(), DocumentKind::Image);
        assert_eq!(DocumentKind::from_filename("a.b.tiff").unwrap(), DocumentKind::Image);

        let err = DocumentKind::from_filename("notes.docx").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedDocument);
        assert!(DocumentKind::from_filename("no_extension").is_err());
    }

    #[test]
    fn source_document_accessors() {
        let doc = SourceDocument::new(b"%PDF-1.7".to_vec(), DocumentKind::Pdf, "cv.pdf");
        assert_eq!(doc.len(), 8);
        assert!(!doc.is_empty());
        assert_eq!(doc.kind(), DocumentKind::Pdf);
        assert_eq!(doc.filename(), "cv.pdf");
        assert_eq!(&doc.bytes()[..4], b"%PDF");
    }

    #[test]
    fn kind_serialises_lowercase() {
        assert_eq!(serde_json::to_string(&DocumentKind::Image).unwrap(), "\"image\"");
        assert_eq!(DocumentKind::Pdf.to_string(), "pdf");
    }
}
