//! CLI binary for edgequake-docextract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one document through the `DocumentService` and
//! prints the result.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use edgequake_docextract::pipeline::input::resolve_input;
use edgequake_docextract::research::vendor_name_from_document;
use edgequake_docextract::{
    ApiResponse, DocumentService, ExtractionConfig, ExtractionProgressCallback, Extractor,
    PageFailurePolicy, ProgressCallback, VerificationMode,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page. Pages finish out of order
/// when extracted concurrently, so start times are tracked per page.
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
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Splitting document…");
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
            .unwrap_or_else(|p| p.into_inner())
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} page(s)…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, json_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{json_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(std::iter::once('…')).collect()
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

    fn on_verification_start(&self, document_type: &str) {
        self.bar.set_prefix("Verifying");
        self.bar.set_message(document_type.to_string());
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} page(s) extracted",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract an invoice to stdout
  docextract invoice.pdf

  # Tax form schema, written to a file
  docextract --schema 1040 return.pdf -o return.json

  # Check extraction accuracy instead of arithmetic
  docextract --verification extraction statement.pdf

  # Wrap the result in the API envelope
  docextract --envelope receipt.png

  # Export the derived transactions as QuickBooks QBO
  docextract --export qbo statement.pdf -o statement.qbo

  # Also research the vendor named on the document
  docextract --research-vendor invoice.pdf

SCHEMAS:
  generic (default), 1040, 2848, 8821, 941, payroll
  Named schemas are read from --schema-dir/<id>.json; anything missing
  falls back to the built-in generic schema.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory (or file) of the pdfium shared library
"#;

/// Extract structured JSON from financial documents using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract structured JSON from financial documents using LLMs",
    long_about = "Extract invoices, receipts, bank and payment-processing statements and tax \
forms into JSON. PDFs are split into pages, each page is transcribed and coerced into the \
chosen schema, the pages are merged and the result is checked by a verification pass.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path (PDF, image, CSV, text) or HTTP/HTTPS URL.
    input: String,

    /// Write the result to this file instead of stdout.
    #[arg(short, long, env = "DOCEXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Extraction schema: generic, 1040, 2848, 8821, 941, payroll.
    #[arg(long, env = "DOCEXTRACT_SCHEMA")]
    schema: Option<String>,

    /// Directory holding <schema>.json files.
    #[arg(long, env = "DOCEXTRACT_SCHEMA_DIR")]
    schema_dir: Option<PathBuf>,

    /// What the verification pass checks: math or extraction.
    #[arg(long, env = "DOCEXTRACT_VERIFICATION", default_value = "math")]
    verification: VerificationMode,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of pages extracted concurrently.
    #[arg(short, long, env = "DOCEXTRACT_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOCEXTRACT_MAX_OUTPUT_TOKENS", default_value_t = 8192)]
    max_output_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCEXTRACT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Retries per model call on failure.
    #[arg(long, env = "DOCEXTRACT_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per model call timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Leave failed pages out of the merge instead of failing the document.
    #[arg(
        long,
        env = "DOCEXTRACT_SKIP_FAILED_PAGES",
        default_value_t = true,
        action = ArgAction::Set
    )]
    skip_failed_pages: bool,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCEXTRACT_PASSWORD")]
    password: Option<String>,

    /// Directory (or file) of the pdfium shared library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCEXTRACT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output the derived transactions in this format (csv, json, xml, qbo)
    /// instead of the document.
    #[arg(long, env = "DOCEXTRACT_EXPORT")]
    export: Option<String>,

    /// Research the vendor named on the document; printed to stderr.
    #[arg(long)]
    research_vendor: bool,

    /// Print `{"response": …}` / `{"error": …, "detail": …}` instead of bare JSON.
    #[arg(long)]
    envelope: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCEXTRACT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCEXTRACT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; -v always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.envelope;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let extractor = Extractor::from_config(config).context("Failed to set up the LLM provider")?;
    let service = DocumentService::new(extractor);

    // ── Envelope mode: every failure is reported inside the envelope ─────
    if cli.envelope {
        let response = match resolve_input(&cli.input, cli.download_timeout).await {
            Ok(doc) => service.upload(&doc.name, doc.bytes, cli.schema.as_deref()).await,
            Err(e) => ApiResponse::failed(e.to_string()),
        };
        let json = serde_json::to_string_pretty(&response).context("Failed to serialise response")?;
        write_output(cli.output.as_ref(), &json).await?;
        if response.is_error() {
            std::process::exit(1);
        }
        return Ok(());
    }

    // ── Extract ──────────────────────────────────────────────────────────
    let doc = resolve_input(&cli.input, cli.download_timeout)
        .await
        .context("Failed to read input")?;
    let output = service
        .extract_and_record(&doc.name, doc.bytes, cli.schema.as_deref())
        .await
        .context("Extraction failed")?;

    let payload = match cli.export.as_deref() {
        Some(format) => service.export(format).context("Export failed")?,
        None => output.response_text(),
    };
    write_output(cli.output.as_ref(), &payload).await?;

    if cli.research_vendor {
        match output.body.as_structured().and_then(vendor_name_from_document) {
            Some(name) => {
                let research = service
                    .research_vendor(name)
                    .await
                    .context("Vendor research failed")?;
                eprintln!("{} {}", bold("Vendor:"), research.vendor_name);
                eprintln!("{}", research.vendor_info);
            }
            None => eprintln!("{} no vendor name on the document", cyan("⚠")),
        }
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet {
        let stats = &output.stats;
        if let Some(ref report) = output.report {
            eprintln!(
                "{}  {} as {}  {} discrepancies",
                if report.verified { green("✔ verified") } else { cyan("⚠ not verified") },
                dim(cli.verification.report_key()),
                output
                    .document_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown".into()),
                report.discrepancies.len(),
            );
            if !report.summary.is_empty() {
                eprintln!("   {}", dim(&report.summary));
            }
        } else {
            eprintln!("{} no page produced JSON; raw text returned", cyan("⚠"));
        }
        eprintln!(
            "   {}/{} pages  {} unparsed  {} transactions  {}ms total",
            stats.extracted_pages,
            stats.total_pages,
            stats.unparsed_pages,
            service.store().len(),
            stats.total_duration_ms,
        );
    }

    Ok(())
}

/// Write to the output file (atomically) or stdout.
async fn write_output(path: Option<&PathBuf>, payload: &str) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let tmp = path.with_extension("tmp");
            tokio::fs::write(&tmp, payload)
                .await
                .with_context(|| format!("Failed to write {}", tmp.display()))?;
            tokio::fs::rename(&tmp, path)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(payload.as_bytes())
                .context("Failed to write to stdout")?;
            if !payload.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let policy = if cli.skip_failed_pages {
        PageFailurePolicy::Skip
    } else {
        PageFailurePolicy::Abort
    };

    let mut builder = ExtractionConfig::builder()
        .concurrency(cli.concurrency)
        .max_output_tokens(cli.max_output_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .verification(cli.verification)
        .page_failure_policy(policy);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if let Some(ref dir) = cli.schema_dir {
        builder = builder.schema_dir(dir);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
