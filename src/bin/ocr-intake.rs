//! CLI binary for ocr-intake.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_intake::{
    extract_fields_with, format_file_size, DocumentKind, ExtractedFields, FieldOptions,
    IntakeError, OcrProgressCallback, PageFailurePolicy, Pipeline, PipelineConfig, PipelineResult,
    ProgressCallback, DEFAULT_MAX_TOTAL_PIXELS,
};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page. Pages finish out of order
/// when OCR runs concurrently, so timings are tracked per page number.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl OcrProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("OCR");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Recognising {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap()
            .insert(page_num, Instant::now());
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, total_pages: usize, success_count: usize) {
        let failed = self.errors.load(Ordering::SeqCst);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} page(s) recognised",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} page(s) recognised  ({} failed)",
                if failed == total_pages {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a résumé and print the extracted fields
  ocr-intake resume.pdf

  # Full result (text, fields, per-page detail) as JSON
  ocr-intake --json scan.png > result.json

  # Write the JSON result to a file
  ocr-intake resume.pdf -o result.json

  # Extract fields from text you already have (stdin with -)
  pdftotext cv.pdf - | ocr-intake --fields-only -

  # Check that tesseract and pdfium are usable
  ocr-intake --check

SUPPORTED INPUTS:
  pdf                          rendered page by page with pdfium
  png jpg jpeg tif tiff bmp    OCRed directly as a single page
  gif webp

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  OCR_INTAKE_TESSERACT    Path to the tesseract binary
  OCR_INTAKE_LANG         Tesseract language(s), e.g. eng+fra
  OCR_INTAKE_PASSWORD     Password for encrypted PDFs
  RUST_LOG                Log filter, e.g. ocr_intake=debug
"#;

/// OCR PDFs and images, then extract contact fields.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-intake",
    version,
    about = "OCR PDFs and images, then extract name, e-mail, phone and LinkedIn fields",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF or image file (or a text file / `-` with --fields-only).
    #[arg(required_unless_present = "check")]
    input: Option<PathBuf>,

    /// Declared document kind; derived from the file extension when omitted.
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Write the JSON result to this file instead of stdout.
    #[arg(short, long, env = "OCR_INTAKE_OUTPUT")]
    output: Option<PathBuf>,

    /// Print the full result as JSON.
    #[arg(long, env = "OCR_INTAKE_JSON")]
    json: bool,

    /// Print only the recognised document text.
    #[arg(long, conflicts_with = "json")]
    text: bool,

    /// Treat the input as plain text and only run field extraction.
    #[arg(long)]
    fields_only: bool,

    /// With --fields-only, echo the input text in the JSON output.
    #[arg(long, requires = "fields_only")]
    include_raw: bool,

    /// Probe the OCR engine and pdfium, print their status and exit.
    #[arg(long)]
    check: bool,

    /// Rendering DPI (72–600).
    #[arg(long, env = "OCR_INTAKE_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Number of pages OCRed concurrently.
    #[arg(short, long, env = "OCR_INTAKE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Tesseract language(s).
    #[arg(short, long, env = "OCR_INTAKE_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "OCR_INTAKE_PSM", default_value_t = 3)]
    psm: u8,

    /// Tesseract binary.
    #[arg(long, env = "OCR_INTAKE_TESSERACT", default_value = "tesseract")]
    tesseract_path: PathBuf,

    /// pdfium shared library (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "OCR_INTAKE_PASSWORD")]
    password: Option<String>,

    /// Per-page OCR timeout in seconds.
    #[arg(long, env = "OCR_INTAKE_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Rasterisation timeout in seconds.
    #[arg(long, env = "OCR_INTAKE_RASTER_TIMEOUT", default_value_t = 120)]
    rasterize_timeout: u64,

    /// Pixel budget for all rendered pages of one document.
    #[arg(long, env = "OCR_INTAKE_MAX_TOTAL_PIXELS", default_value_t = DEFAULT_MAX_TOTAL_PIXELS)]
    max_total_pixels: u64,

    /// Reject documents with more pages than this.
    #[arg(long, env = "OCR_INTAKE_MAX_PAGES", default_value_t = 500)]
    max_pages: usize,

    /// Fail the document if any page fails OCR (default: only if all fail).
    #[arg(long)]
    strict: bool,

    /// Drop repeated e-mails and phone numbers.
    #[arg(long, env = "OCR_INTAKE_DEDUPE")]
    dedupe: bool,

    /// Disable progress bar.
    #[arg(long, env = "OCR_INTAKE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCR_INTAKE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCR_INTAKE_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Pdf,
    Image,
}

impl From<KindArg> for DocumentKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Pdf => DocumentKind::Pdf,
            KindArg::Image => DocumentKind::Image,
        }
    }
}

#[derive(Serialize)]
struct HealthRecord<'a> {
    status: &'a str,
    service: &'a str,
    #[serde(flatten)]
    engines: &'a ocr_intake::EngineStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldsRecord<'a> {
    fields: &'a ExtractedFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_text: Option<&'a str>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let machine_output = cli.json || cli.text || cli.fields_only || cli.check;
    let show_progress = !cli.quiet && !cli.no_progress && !machine_output;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Fields-only mode (no engines needed) ─────────────────────────────
    if cli.fields_only {
        let input = cli.input.as_deref().context("No input given")?;
        let text = read_text_input(input)?;
        let options = FieldOptions { dedupe: cli.dedupe };
        let fields = extract_fields_with(&text, &options);
        let record = FieldsRecord {
            fields: &fields,
            raw_text: cli.include_raw.then_some(text.as_str()),
        };
        let json = serde_json::to_string_pretty(&record).context("Failed to serialise fields")?;
        return emit(&cli, &json).await;
    }

    // ── Engine startup ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn OcrProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let pipeline = Pipeline::initialize(config)
        .await
        .context("OCR engines are not available")?;

    if cli.check {
        let record = HealthRecord {
            status: "ok",
            service: "ocr-intake",
            engines: pipeline.engine_status(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&record).context("Failed to serialise status")?
        );
        return Ok(());
    }

    // ── Process document ─────────────────────────────────────────────────
    let input = cli.input.as_deref().context("No input given")?;
    let filename = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let kind = match cli.kind {
        Some(k) => k.into(),
        None => DocumentKind::from_filename(&filename).context("Cannot determine document kind")?,
    };

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;
    if !cli.quiet && !machine_output {
        eprintln!(
            "{} {} ({}, {})",
            cyan("◆"),
            bold(&filename),
            kind,
            format_file_size(bytes.len() as u64)
        );
    }

    let result = match pipeline.process_document(bytes, kind, &filename).await {
        Ok(r) => r,
        Err(e) => {
            if cli.json {
                let report = serde_json::to_string_pretty(&e.report())
                    .context("Failed to serialise error")?;
                println!("{report}");
            }
            if matches!(e, IntakeError::PasswordRequired { .. }) && !cli.quiet {
                eprintln!(
                    "{} Provide it with --password <PASSWORD> or OCR_INTAKE_PASSWORD.",
                    cyan("hint:")
                );
            }
            return Err(e).with_context(|| format!("Failed to process {filename}"));
        }
    };

    // ── Output ───────────────────────────────────────────────────────────
    if cli.text {
        println!("{}", result.document_text);
    } else if cli.json || cli.output.is_some() {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
        emit(&cli, &json).await?;
    } else {
        print_summary(&result);
    }

    if !cli.quiet && !show_progress && !machine_output {
        eprintln!(
            "Recognised {}/{} page(s) in {}ms",
            result.stats.processed_pages, result.page_count, result.stats.total_duration_ms
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .language(cli.lang.clone())
        .page_segmentation(cli.psm)
        .tesseract_path(cli.tesseract_path.clone())
        .ocr_timeout_secs(cli.ocr_timeout)
        .rasterize_timeout_secs(cli.rasterize_timeout)
        .max_pages(cli.max_pages)
        .max_total_pixels(cli.max_total_pixels)
        .dedupe_fields(cli.dedupe);

    if cli.strict {
        builder = builder.failure_policy(PageFailurePolicy::AnyPage);
    }
    if let Some(ref path) = cli.pdfium_lib_path {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Read text for --fields-only: a file path, or `-` for stdin.
fn read_text_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))
    }
}

/// Print to stdout, or write atomically to `--output`.
async fn emit(cli: &Cli, content: &str) -> Result<()> {
    let Some(ref path) = cli.output else {
        println!("{content}");
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, content)
        .await
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    if !cli.quiet {
        eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
    }
    Ok(())
}

fn print_summary(result: &PipelineResult) {
    let fields = &result.fields;
    println!("{}", result.provenance.title());
    println!("Pages:     {}", result.page_count);
    if !result.page_failures.is_empty() {
        println!("Failed:    {:?}", result.page_failures);
    }
    println!("Name:      {}", fields.name.as_deref().unwrap_or("-"));
    println!("Emails:    {}", join_or_dash(&fields.emails));
    println!("Phones:    {}", join_or_dash(&fields.phones));
    println!(
        "LinkedIn:  {}",
        fields.linkedin_ref.as_deref().unwrap_or("-")
    );
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
