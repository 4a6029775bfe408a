//! Output-side data model: what the pipeline returns to its caller.

use crate::document::DocumentKind;
use crate::error::PageError;
use crate::fields::ExtractedFields;
use serde::{Deserialize, Serialize};

/// OCR outcome for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// 1-based page ordinal.
    pub page_num: usize,
    /// Recognised text; empty for blank pages and failed pages.
    pub text: String,
    /// Wall-clock time spent on this page.
    pub duration_ms: u64,
    /// Present when OCR of this page failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Which input a result was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    /// Filename supplied by the caller.
    pub source_name: String,
    pub kind: DocumentKind,
    pub byte_len: usize,
}

impl Provenance {
    /// Short display line, e.g. `Title: resume.pdf`.
    pub fn title(&self) -> String {
        format!("Title: {}", self.source_name)
    }
}

/// Timing for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub processed_pages: usize,
    pub failed_pages: usize,
    pub rasterize_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything the pipeline produces for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    /// Page texts joined with single spaces in page order.
    pub document_text: String,
    pub page_count: usize,
    pub fields: ExtractedFields,
    /// Ordinals of pages whose OCR failed, ascending.
    pub page_failures: Vec<usize>,
    pub pages: Vec<PageResult>,
    pub provenance: Provenance,
    pub stats: ProcessingStats,
}

/// Render a byte count for humans, e.g. `1.5MB`.
pub fn format_file_size(size_bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if size_bytes == 0 {
        return "0B".to_string();
    }
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(0), "0B");
        assert_eq!(format_file_size(512), "512.0B");
        assert_eq!(format_file_size(1536), "1.5KB");
        assert_eq!(format_file_size(16 * 1024 * 1024), "16.0MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120.0GB");
    }

    #[test]
    fn provenance_title() {
        let p = Provenance {
            source_name: "resume.pdf".into(),
            kind: DocumentKind::Pdf,
            byte_len: 10,
        };
        assert_eq!(p.title(), "Title: resume.pdf");
    }

    #[test]
    fn result_serialises_boundary_fields() {
        let result = PipelineResult {
            document_text: "A  C".into(),
            page_count: 3,
            fields: ExtractedFields::default(),
            page_failures: vec![2],
            pages: vec![PageResult {
                page_num: 2,
                text: String::new(),
                duration_ms: 5,
                error: Some(PageError::Timeout { page: 2, secs: 60 }),
            }],
            provenance: Provenance {
                source_name: "a.pdf".into(),
                kind: DocumentKind::Pdf,
                byte_len: 1,
            },
            stats: ProcessingStats::default(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["documentText"], "A  C");
        assert_eq!(json["pageCount"], 3);
        assert_eq!(json["pageFailures"], serde_json::json!([2]));
        assert_eq!(json["fields"]["phones"], serde_json::json!([]));
        assert_eq!(json["provenance"]["kind"], "pdf");
        assert!(json["pages"][0]["error"].is_object());
    }
}
