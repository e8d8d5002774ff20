//! CLI binary for mdrop.
//!
//! A terminal host for the upload workflow: each FILE argument is fed to the
//! controller as a file-picker selection, progress renders as an indicatif
//! bar, and notices print as coloured status lines.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdrop::{
    ControllerHandle, DirectoryDownloader, FileRef, Notice, PresentationSurface, Settlement,
    Severity, UploadController, WorkflowConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, warn};
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

// ── Terminal presentation surface ────────────────────────────────────────────

const HELP_LINES: &[&str] = &[
    "How it works:",
    "  1. Pick a document (PDF, DOCX, PPTX, XLSX, HTML, images, audio, …).",
    "  2. It is uploaded to the conversion service.",
    "  3. The Markdown result can be printed, copied or saved as <name>.md.",
];

/// Renders workflow writes to stderr (and the preview to stdout).
struct TerminalSurface {
    bar: Option<ProgressBar>,
    help_visible: bool,
    print_preview: bool,
    quiet: bool,
}

impl TerminalSurface {
    fn new(print_preview: bool, quiet: bool) -> Self {
        Self {
            bar: None,
            help_visible: true,
            print_preview,
            quiet,
        }
    }

    /// Print without tearing the progress bar.
    fn line(&self, text: String) {
        match &self.bar {
            Some(bar) => bar.println(text),
            None => eprintln!("{text}"),
        }
    }
}

impl PresentationSurface for TerminalSurface {
    fn set_progress_visible(&mut self, visible: bool) {
        if visible && self.bar.is_none() && !self.quiet {
            let bar = ProgressBar::new(100);
            bar.set_style(
                ProgressStyle::with_template(
                    "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  ")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
            );
            bar.set_prefix("Converting");
            bar.enable_steady_tick(std::time::Duration::from_millis(80));
            self.bar = Some(bar);
        } else if !visible {
            if let Some(bar) = self.bar.take() {
                bar.finish_and_clear();
            }
        }
    }

    fn set_progress(&mut self, percent: u8) {
        if let Some(bar) = &self.bar {
            bar.set_position(percent as u64);
        }
    }

    fn set_preview(&mut self, markdown: Option<&str>) {
        let Some(markdown) = markdown else { return };
        if !self.print_preview {
            return;
        }
        let write = || {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            let _ = handle.write_all(markdown.as_bytes());
            // Ensure a trailing newline on stdout.
            if !markdown.ends_with('\n') {
                let _ = handle.write_all(b"\n");
            }
        };
        match &self.bar {
            Some(bar) => bar.suspend(write),
            None => write(),
        }
    }

    fn set_help_visible(&mut self, visible: bool) {
        if visible && !self.help_visible && !self.quiet {
            for l in HELP_LINES {
                self.line(dim(l));
            }
        }
        self.help_visible = visible;
    }

    fn show_notice(&mut self, notice: &Notice) {
        if self.quiet && notice.severity != Severity::Danger {
            return;
        }
        let icon = match notice.severity {
            Severity::Success => green(notice.severity.icon()),
            Severity::Danger => red(notice.severity.icon()),
            Severity::Info => cyan(notice.severity.icon()),
        };
        self.line(format!("{icon} {}", notice.message));
    }
}

// ── CLI ──────────────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert and print the Markdown
  mdrop report.pdf --print

  # Convert several files and save each as <name>.md
  mdrop slides.pptx sheet.xlsx --out-dir converted/

  # Copy the result to the clipboard (falls back to OSC 52 over SSH)
  mdrop notes.docx --copy

  # Only upload types the service accepts
  mdrop --accept pdf,docx,html scan.tiff

ENVIRONMENT VARIABLES:
  MDROP_ENDPOINT     Conversion endpoint URL
  MDROP_OUT_DIR      Directory for downloaded .md files
  RUST_LOG           Overrides the log filter (e.g. mdrop=debug)
"#;

/// Upload documents to a Markdown conversion service.
#[derive(Parser, Debug)]
#[command(
    name = "mdrop",
    version,
    about = "Upload documents to a Markdown conversion service",
    long_about = "Upload each FILE to a conversion endpoint as multipart/form-data, show \
progress while the service works, then print, copy or save the Markdown it returns.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to convert. A missing path counts as an empty selection.
    files: Vec<PathBuf>,

    /// Conversion endpoint.
    #[arg(long, env = "MDROP_ENDPOINT", default_value = "http://127.0.0.1:5000/convert")]
    endpoint: String,

    /// Multipart field carrying the file.
    #[arg(long, env = "MDROP_FIELD", default_value = "file")]
    field: String,

    /// Save each result as <name>.md in this directory.
    #[arg(short, long, env = "MDROP_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Copy each result to the clipboard.
    #[arg(short, long, env = "MDROP_COPY")]
    copy: bool,

    /// Print each result to stdout.
    #[arg(short, long, env = "MDROP_PRINT")]
    print: bool,

    /// Only submit files with these extensions (comma separated).
    #[arg(long, env = "MDROP_ACCEPT", value_delimiter = ',')]
    accept: Vec<String>,

    /// Client-side request timeout in seconds (default: none).
    #[arg(long, env = "MDROP_TIMEOUT")]
    timeout: Option<u64>,

    /// Progress tick interval in milliseconds.
    #[arg(long, env = "MDROP_TICK_MS", default_value_t = 200)]
    tick_ms: u64,

    /// Delay before the progress bar is retired, in milliseconds.
    #[arg(long, env = "MDROP_HIDE_MS", default_value_t = 1000)]
    hide_ms: u64,

    /// Seed for the simulated progress steps.
    #[arg(long, env = "MDROP_SEED")]
    seed: Option<u64>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MDROP_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MDROP_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and notices already tell the user what happens, so
    // library logs stay at warn unless asked for.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config and controller ──────────────────────────────────────
    let config = build_config(&cli)?;
    let surface = TerminalSurface::new(cli.print, cli.quiet);
    let (mut controller, handle) =
        UploadController::http(&config, surface).context("Failed to set up the uploader")?;
    if let Some(ref dir) = cli.out_dir {
        controller = controller.with_downloader(Box::new(DirectoryDownloader::new(dir)));
    }
    let task = controller.spawn();

    // ── Feed selections one at a time ────────────────────────────────────
    let selections: Vec<Option<FileRef>> = if cli.files.is_empty() {
        vec![None]
    } else {
        cli.files
            .iter()
            .map(|path| {
                if path.is_file() {
                    Some(FileRef::from_path(path))
                } else {
                    warn!("'{}' is not a readable file", path.display());
                    None
                }
            })
            .collect()
    };

    let total = selections.len();
    let mut failures = 0usize;

    for selection in selections {
        let name = selection
            .as_ref()
            .map(|f| f.name().to_string())
            .unwrap_or_default();

        let outcome = feed(&handle, selection).await?;
        if outcome != Outcome::Converted {
            debug!("'{}' ended as {:?}", name, outcome);
            failures += 1;
            continue;
        }

        if cli.out_dir.is_some() {
            match handle.download().await? {
                Ok(path) if !cli.quiet => {
                    eprintln!("  {} {}", dim("→"), bold(&path.display().to_string()));
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Download of '{}' failed: {}", name, e);
                    failures += 1;
                }
            }
        }

        if cli.copy {
            if let Err(e) = handle.copy().await? {
                warn!("Copy of '{}' failed: {}", name, e);
                failures += 1;
            }
        }
    }

    handle.shutdown();
    task.await.context("Controller task failed")?;

    if failures > 0 {
        anyhow::bail!("{failures} of {total} submissions did not complete");
    }
    Ok(())
}

/// What became of one FILE argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Missing,
    Rejected,
    Failed,
    Converted,
}

/// Hand one selection to the controller and wait until it is finished with.
async fn feed(handle: &ControllerHandle, selection: Option<FileRef>) -> Result<Outcome> {
    let Some(file) = selection else {
        handle.select_file(None)?;
        return Ok(Outcome::Missing);
    };

    let outcome = match handle.submit_and_wait(file).await? {
        Settlement::Rejected(_) => Outcome::Rejected,
        settled if settled.is_success() => Outcome::Converted,
        Settlement::Settled(_) => Outcome::Failed,
    };
    // Let the bar show its final state before anything else prints.
    handle.wait_for(|s| !s.progress_visible).await?;
    Ok(outcome)
}

/// Map CLI args to `WorkflowConfig`.
fn build_config(cli: &Cli) -> Result<WorkflowConfig> {
    let mut builder = WorkflowConfig::builder()
        .endpoint(cli.endpoint.clone())
        .field_name(cli.field.clone())
        .tick_interval_ms(cli.tick_ms)
        .hide_delay_ms(cli.hide_ms)
        .accepted_extensions(&cli.accept);

    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }

    builder.build().context("Invalid configuration")
}
