//! CLI binary for profile-export.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExportConfig`, runs the export and prints a summary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use profile_export::{
    export_to_file, registry, render_preview, resolve_template, AssetClass, Document, ExportConfig,
    ExportProgressCallback, Locale, ProgressCallback, Rgb,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

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

/// Terminal progress callback: a live progress bar plus one log line per
/// logical page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_export_start` tells us the page count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving background…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Rendering");
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExportProgressCallback for CliProgressCallback {
    fn on_export_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Rendering {total_pages} logical pages…"))
        ));
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total,
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

    fn on_export_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!("{} {} pages rendered", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} pages rendered  ({} skipped)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Export a document record to PDF
  profile-export export profile.json -o profile.pdf

  # Arabic page numbers, assets under a CDN
  profile-export export profile.json -o profile.pdf --locale ar \
      --storage-url https://cdn.example.com/storage

  # Machine-readable result (outcomes, warnings, stats)
  profile-export export profile.json -o profile.pdf --json

  # Preview a template with its defaults, or with persisted data
  profile-export preview staff
  profile-export preview about --data about.json

  # List template kinds and their fields
  profile-export templates

ENVIRONMENT VARIABLES:
  PROFILE_EXPORT_LOCALE         en | ar
  PROFILE_EXPORT_STORAGE_URL    Storage base URL for relative asset paths
  PROFILE_EXPORT_IMAGE_TIMEOUT  Per-image wait in seconds
  RUST_LOG                      Overrides the log filter
"#;

/// Export company-profile documents to paginated PDF.
#[derive(Parser, Debug)]
#[command(
    name = "profile-export",
    version,
    about = "Export company-profile documents to paginated PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PROFILE_EXPORT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PROFILE_EXPORT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a document record (JSON) to PDF.
    Export(ExportArgs),
    /// Print the preview markup of a template kind.
    Preview {
        /// cover, toc, about, staff, content or projects.
        kind: String,
        /// JSON file with persisted page data; defaults are used when omitted.
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// List the registered template kinds and their fields as JSON.
    Templates,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Document record as JSON.
    input: PathBuf,

    /// Write the PDF here.
    #[arg(short, long, env = "PROFILE_EXPORT_OUTPUT")]
    output: PathBuf,

    /// Language of page-number phrases: en or ar.
    #[arg(long, env = "PROFILE_EXPORT_LOCALE", default_value = "en")]
    locale: Locale,

    /// Rasterisation scale (1–4).
    #[arg(long, env = "PROFILE_EXPORT_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Upper bound on waiting for one embedded image, in seconds.
    #[arg(long, env = "PROFILE_EXPORT_IMAGE_TIMEOUT", default_value_t = 10)]
    image_timeout: u64,

    /// Timeout for backgrounds and attachments, in seconds.
    #[arg(long, env = "PROFILE_EXPORT_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Storage base URL for relative and temp-file asset references.
    #[arg(long, env = "PROFILE_EXPORT_STORAGE_URL")]
    storage_url: Option<String>,

    /// Storage base URL for attachments only.
    #[arg(long, env = "PROFILE_EXPORT_ATTACHMENT_URL")]
    attachment_url: Option<String>,

    /// Page background colour (#rrggbb) when the document has none.
    #[arg(long, env = "PROFILE_EXPORT_BACKGROUND_COLOR", value_parser = parse_color)]
    background_color: Option<Rgb>,

    /// Do not append attachments after the pages.
    #[arg(long)]
    no_attachments: bool,

    /// Disable progress bar.
    #[arg(long, env = "PROFILE_EXPORT_NO_PROGRESS")]
    no_progress: bool,

    /// Print the export result (outcomes, warnings, stats) as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_color(s: &str) -> std::result::Result<Rgb, String> {
    Rgb::parse_hex(s).ok_or_else(|| format!("'{s}' is not a #rgb or #rrggbb colour"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs while it is visible.
    let show_progress = match &cli.command {
        Command::Export(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Export(args) => run_export(args, cli.quiet, show_progress).await,
        Command::Preview { kind, data } => run_preview(&kind, data).await,
        Command::Templates => {
            let json = serde_json::to_string_pretty(registry().definitions())
                .context("Failed to serialise the template registry")?;
            println!("{json}");
            Ok(())
        }
    }
}

async fn run_export(args: ExportArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let document = Document::from_json(&raw)
        .with_context(|| format!("{} is not a document record", args.input.display()))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExportProgressCallback>)
    } else {
        None
    };
    let config = build_config(&args, progress_cb)?;

    if args.json {
        let output = profile_export::export(&document, &config)
            .await
            .context("Export failed")?;
        write_pdf(&args.output, &output.pdf).await?;
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }

    let stats = export_to_file(&document, &args.output, &config)
        .await
        .context("Export failed")?;

    if !quiet {
        eprintln!(
            "{}  {}/{} pages  +{} attachments  {} warnings  {}ms  →  {}",
            if stats.skipped_pages == 0 && stats.warnings == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.rendered_pages,
            stats.logical_pages,
            stats.attachment_pages,
            stats.warnings,
            stats.total_duration_ms,
            bold(&args.output.display().to_string()),
        );
        eprintln!(
            "   {} output pages  /  {} bytes",
            dim(&stats.output_pages.to_string()),
            dim(&stats.output_bytes.to_string()),
        );
    }
    Ok(())
}

async fn run_preview(kind: &str, data: Option<PathBuf>) -> Result<()> {
    let persisted = match data {
        Some(path) => {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))?
        }
        None => Value::Null,
    };
    let page = resolve_template(kind, &persisted)?;
    println!("{}", render_preview(&page));
    Ok(())
}

async fn write_pdf(path: &Path, pdf: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, pdf)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Map CLI args to `ExportConfig`.
fn build_config(args: &ExportArgs, progress: Option<ProgressCallback>) -> Result<ExportConfig> {
    let mut builder = ExportConfig::builder()
        .locale(args.locale)
        .scale(args.scale)
        .image_timeout_secs(args.image_timeout)
        .download_timeout_secs(args.download_timeout)
        .include_attachments(!args.no_attachments);

    if let Some(ref url) = args.storage_url {
        builder = builder.storage_base_url(url.clone());
    }
    if let Some(ref url) = args.attachment_url {
        builder = builder.storage_base_url_for(AssetClass::Attachment, url.clone());
    }
    if let Some(color) = args.background_color {
        builder = builder.background_color(color);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
