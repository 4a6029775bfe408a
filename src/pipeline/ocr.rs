//! OCR engine adapter: one page image in, recognised text out.
//!
//! [`OcrEngine`] is the seam; [`TesseractEngine`] drives the `tesseract`
//! command-line binary. Each call writes the page to a scratch PNG that is
//! deleted when the call returns, and the child process is killed if the
//! calling future is dropped (timeout or cancellation), so abandoned pages
//! leave nothing behind.
//!
//! Availability is checked once, in [`TesseractEngine::probe`], when the
//! pipeline is initialised. Per-page calls never re-resolve the binary.

use crate::config::PipelineConfig;
use crate::document::PageImage;
use crate::error::{IntakeError, PageError};
use async_trait::async_trait;
use image::ImageFormat;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Turns a single page image into text.
///
/// Implementations must not mutate the page and must return `Ok("")` for a
/// blank or unreadable page; `Err` is reserved for engine failures.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short identifier used in logs and engine status.
    fn name(&self) -> &str;

    /// Engine version, when known.
    fn version(&self) -> Option<&str> {
        None
    }

    async fn recognize(&self, page: &PageImage) -> Result<String, PageError>;
}

/// Upper bound for the startup `--version` / `--list-langs` probes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest stderr excerpt kept in a [`PageError`].
const STDERR_EXCERPT: usize = 300;

/// [`OcrEngine`] backed by the tesseract CLI.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    binary: PathBuf,
    language: String,
    page_segmentation: u8,
    version: String,
}

impl TesseractEngine {
    /// Verify the binary runs and has every requested language installed.
    ///
    /// # Errors
    /// [`IntakeError::EngineUnavailable`] when the binary is missing, fails
    /// to report a version, or lacks a traineddata file for `language`.
    pub async fn probe(config: &PipelineConfig) -> Result<Self, IntakeError> {
        let binary = config.tesseract_path.clone();

        let version_out = run_probe(&binary, &["--version"]).await?;
        // tesseract 3.x prints its version on stderr, 4.x+ on stdout.
        let version = first_line(&version_out.stdout)
            .or_else(|| first_line(&version_out.stderr))
            .unwrap_or_else(|| "tesseract (unknown version)".to_string());

        let langs_out = run_probe(&binary, &["--list-langs"]).await?;
        let installed = parse_language_list(&String::from_utf8_lossy(&langs_out.stdout));
        let missing: Vec<&str> = config
            .language
            .split('+')
            .filter(|l| !installed.iter().any(|i| i == l))
            .collect();
        if !missing.is_empty() {
            return Err(IntakeError::EngineUnavailable {
                engine: "tesseract".to_string(),
                detail: format!("language data not installed: {}", missing.join(", ")),
                hint: format!(
                    "Install the traineddata files (installed: {}).",
                    if installed.is_empty() {
                        "none".to_string()
                    } else {
                        installed.join(", ")
                    }
                ),
            });
        }

        info!("Tesseract ready: {} (lang={})", version, config.language);

        Ok(Self {
            binary,
            language: config.language.clone(),
            page_segmentation: config.page_segmentation,
            version,
        })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn version(&self) -> Option<&str> {
        Some(&self.version)
    }

    async fn recognize(&self, page: &PageImage) -> Result<String, PageError> {
        let page_num = page.ordinal;
        let prep_err = |detail: String| PageError::ImagePreparation {
            page: page_num,
            detail,
        };

        let scratch = tempfile::Builder::new()
            .prefix("ocr-intake-page-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| prep_err(format!("scratch file: {e}")))?;

        // PNG encoding is CPU-bound; keep it off the async worker threads.
        let image = page.image.clone();
        let path = scratch.path().to_path_buf();
        tokio::task::spawn_blocking(move || image.save_with_format(&path, ImageFormat::Png))
            .await
            .map_err(|e| prep_err(format!("encode task panicked: {e}")))?
            .map_err(|e| prep_err(format!("PNG encoding failed: {e}")))?;

        let output = Command::new(&self.binary)
            .arg(scratch.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation.to_string())
            .arg("--dpi")
            .arg(page.dpi.to_string())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PageError::RecognitionFailed {
                page: page_num,
                detail: format!("could not run {}: {}", self.binary.display(), e),
            })?;

        if !output.status.success() {
            return Err(PageError::RecognitionFailed {
                page: page_num,
                detail: format!(
                    "tesseract exited with {}: {}",
                    output.status,
                    stderr_excerpt(&output.stderr)
                ),
            });
        }

        if !output.stderr.is_empty() {
            debug!(
                "Page {}: tesseract stderr: {}",
                page_num,
                stderr_excerpt(&output.stderr)
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Page {}: {} bytes recognised", page_num, text.len());
        Ok(text)
    }
}

async fn run_probe(binary: &Path, args: &[&str]) -> Result<std::process::Output, IntakeError> {
    let unavailable = |detail: String| IntakeError::EngineUnavailable {
        engine: "tesseract".to_string(),
        detail,
        hint: "Install tesseract-ocr or point --tesseract-path at the binary.".to_string(),
    };

    let child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match timeout(PROBE_TIMEOUT, child).await {
        Err(_) => {
            return Err(unavailable(format!(
                "`{} {}` did not answer within {}s",
                binary.display(),
                args.join(" "),
                PROBE_TIMEOUT.as_secs()
            )))
        }
        Ok(Err(e)) if e.kind() == IoErrorKind::NotFound => {
            return Err(unavailable(format!("'{}' not found", binary.display())))
        }
        Ok(Err(e)) => return Err(unavailable(e.to_string())),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        warn!(
            "`{} {}` exited with {}",
            binary.display(),
            args.join(" "),
            output.status
        );
        return Err(unavailable(format!(
            "`{}` exited with {}: {}",
            args.join(" "),
            output.status,
            stderr_excerpt(&output.stderr)
        )));
    }

    Ok(output)
}

fn first_line(bytes: &[u8]) -> Option<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Parse `tesseract --list-langs` output, skipping its header line.
fn parse_language_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.chars().count() > STDERR_EXCERPT {
        let cut: String = text.chars().take(STDERR_EXCERPT).collect();
        format!("{cut}\u{2026}")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parses_language_list() {
        let out = "List of available languages in \"/usr/share/tesseract-ocr/5/tessdata/\" (3):\neng\nosd\nfra\n";
        assert_eq!(parse_language_list(out), vec!["eng", "osd", "fra"]);
        assert!(parse_language_list("").is_empty());
    }

    #[test]
    fn first_non_empty_line() {
        assert_eq!(
            first_line(b"\n tesseract 5.3.0\n leptonica-1.82.0\n").as_deref(),
            Some("tesseract 5.3.0")
        );
        assert_eq!(first_line(b""), None);
    }

    #[test]
    fn stderr_is_truncated() {
        let long = "x".repeat(STDERR_EXCERPT + 50);
        let excerpt = stderr_excerpt(long.as_bytes());
        assert_eq!(excerpt.chars().count(), STDERR_EXCERPT + 1);
        assert!(excerpt.ends_with('\u{2026}'));
        assert_eq!(stderr_excerpt(b"  short \n"), "short");
    }

    #[tokio::test]
    async fn probe_reports_missing_binary() {
        let config = PipelineConfig::builder()
            .tesseract_path("/definitely/not/a/real/tesseract")
            .build()
            .unwrap();
        let err = TesseractEngine::probe(&config).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EngineUnavailable);
        assert!(err.to_string().contains("not found"), "got: {err}");
    }
}
