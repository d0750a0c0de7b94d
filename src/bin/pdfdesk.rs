//! CLI binary for pdfdesk.
//!
//! A thin shim over the operations in `pdfdesk::ops` that maps flags onto
//! the library configuration and prints results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdfdesk::ops::{self, StampPlacement, TextSource};
use pdfdesk::{
    OcrCapability, OcrConfig, OperationProgress, PageLayout, ProgressCallback, SignOptions,
    SignStrategy,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
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

/// Spinner that turns into a page bar once the page count is known.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new(message: &str) -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Working");
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl OperationProgress for CliProgress {
    fn on_operation_start(&self, operation: &str, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_prefix(operation.to_string());
    }

    fn on_page_complete(&self, page_num: usize, total_pages: usize, chars: usize) {
        if chars > 0 {
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}",
                green("✓"),
                page_num,
                total_pages,
                dim(&format!("{chars:>5} chars")),
            ));
        }
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            let head: String = error.chars().take(79).collect();
            format!("{head}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✗"),
            page_num,
            total_pages,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_operation_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        if failed > 0 {
            self.bar.println(format!(
                "{} {}/{} pages ({} failed)",
                cyan("⚠"),
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            ));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Merge two PDFs, in order
  pdfdesk merge a.pdf b.pdf -o merged.pdf

  # One file per page, or a single zip of them
  pdfdesk split report.pdf -o pages/
  pdfdesk split report.pdf -o out/ --zip

  # Stamp a signature line on page 1 (or on an extra page)
  pdfdesk sign contract.pdf --signer "Ada Lovelace" -o signed.pdf
  pdfdesk sign contract.pdf --signer "Ada Lovelace" --strategy append-page

  # Word to PDF and back
  pdfdesk word-to-pdf letter.docx -o letter.pdf
  pdfdesk pdf-to-word scan.pdf -o scan.docx --provider openai --model gpt-4.1-nano

  # Page count, version and whether OCR would be needed
  pdfdesk inspect scan.pdf --json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          Vision provider key used by the OCR fallback
  PDFDESK_OCR_PROVIDER    OCR provider (openai, anthropic, gemini, ollama, …)
  PDFDESK_OCR_MODEL       OCR model id
  PDFDESK_PDFIUM_DIR      Directory holding libpdfium; the system library otherwise
  RUST_LOG                Overrides --verbose / --quiet

OCR:
  pdf-to-word reads the embedded text layer first. Only when a PDF has no
  text at all are its pages rendered with pdfium and transcribed by a vision
  model. Without pdfium or a provider the command fails with a clear
  "OCR unavailable" error instead of writing an empty document.
"#;

/// Merge, split, sign and convert PDF and Word documents.
#[derive(Parser, Debug)]
#[command(
    name = "pdfdesk",
    version,
    about = "Merge, split, sign and convert PDF and Word documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Print machine-readable JSON instead of a summary line.
    #[arg(long, global = true, env = "PDFDESK_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true, env = "PDFDESK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDFDESK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDFDESK_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Concatenate PDFs in the given order.
    Merge {
        /// Two or more PDF files.
        #[arg(required = true, num_args = 2..)]
        inputs: Vec<PathBuf>,
        #[arg(short, long, default_value = "merged.pdf")]
        output: PathBuf,
    },
    /// Write each page to its own PDF.
    Split {
        input: PathBuf,
        /// Directory for page_<n>.pdf files (or the zip).
        #[arg(short, long, default_value = "pages")]
        output: PathBuf,
        /// Bundle the pages into <output>/split_pages.zip instead.
        #[arg(long)]
        zip: bool,
    },
    /// Stamp a "Signed by" line.
    Sign {
        input: PathBuf,
        /// Name printed in the stamp.
        #[arg(long, env = "PDFDESK_SIGNER", default_value = "")]
        signer: String,
        #[arg(short, long, default_value = "signed.pdf")]
        output: PathBuf,
        #[arg(long, env = "PDFDESK_SIGN_STRATEGY", value_enum, default_value = "overlay")]
        strategy: StrategyArg,
    },
    /// Render a .docx file to PDF.
    WordToPdf {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Extract a PDF's text into a .docx file, with OCR for scanned PDFs.
    PdfToWord {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        ocr: OcrArgs,
    },
    /// Print page count, version and text-layer status.
    Inspect { input: PathBuf },
}

#[derive(Args, Debug)]
struct OcrArgs {
    /// Vision provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "PDFDESK_OCR_PROVIDER")]
    provider: Option<String>,

    /// Vision model id.
    #[arg(long, env = "PDFDESK_OCR_MODEL")]
    model: Option<String>,

    /// Directory holding the pdfium shared library.
    #[arg(long, env = "PDFDESK_PDFIUM_DIR")]
    pdfium_dir: Option<PathBuf>,

    /// Pages transcribed concurrently.
    #[arg(long, env = "PDFDESK_OCR_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per page on a vision-model failure.
    #[arg(long, env = "PDFDESK_OCR_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Longest rendered edge in pixels.
    #[arg(long, env = "PDFDESK_OCR_MAX_PIXELS", default_value_t = 2000,
          value_parser = clap::value_parser!(u32).range(100..=8000))]
    max_pixels: u32,

    /// Never fall back to OCR.
    #[arg(long)]
    no_ocr: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StrategyArg {
    Overlay,
    AppendPage,
}

impl From<StrategyArg> for SignStrategy {
    fn from(v: StrategyArg) -> Self {
        match v {
            StrategyArg::Overlay => SignStrategy::Overlay,
            StrategyArg::AppendPage => SignStrategy::AppendPage,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO logs would interleave with the bar; the bar is the feedback.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let progress = show_progress.then(|| CliProgress::new("Opening document…"));
    let callback: Option<ProgressCallback> =
        progress.clone().map(|p| p as Arc<dyn OperationProgress>);

    let result = run(&cli, callback).await;
    if let Some(p) = &progress {
        p.finish();
    }
    let summary = result?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary.json).context("Failed to serialise output")?
        );
    } else if !cli.quiet {
        eprintln!("{} {}", green("✔"), summary.line);
    }
    Ok(())
}

struct Summary {
    line: String,
    json: serde_json::Value,
}

async fn run(cli: &Cli, progress: Option<ProgressCallback>) -> Result<Summary> {
    match &cli.command {
        Command::Merge { inputs, output } => {
            let out = ops::merge(inputs, output).context("Merge failed")?;
            let pages = ops::pdf::page_count(&out)?;
            Ok(Summary {
                line: format!("{} files, {} pages  →  {}", inputs.len(), pages, shown(&out)),
                json: serde_json::json!({ "output": out, "pages": pages }),
            })
        }

        Command::Split { input, output, zip } => {
            if *zip {
                let pages_dir = tempfile::tempdir().context("Failed to create temp dir")?;
                let pages = ops::split(input, pages_dir.path(), progress.as_ref())
                    .context("Split failed")?;
                let archive = ops::zip_pages(&pages, &output.join("split_pages.zip"))
                    .context("Failed to write zip")?;
                Ok(Summary {
                    line: format!("{} pages  →  {}", pages.len(), shown(&archive)),
                    json: serde_json::json!({ "output": archive, "pages": pages.len() }),
                })
            } else {
                let pages =
                    ops::split(input, output, progress.as_ref()).context("Split failed")?;
                Ok(Summary {
                    line: format!("{} pages  →  {}", pages.len(), shown(output)),
                    json: serde_json::json!({ "files": pages }),
                })
            }
        }

        Command::Sign {
            input,
            signer,
            output,
            strategy,
        } => {
            let options = SignOptions {
                strategy: (*strategy).into(),
                ..SignOptions::default()
            };
            let outcome = ops::sign(input, output, signer, &options).context("Sign failed")?;
            let placed = match &outcome.placement {
                StampPlacement::FirstPage => "stamped on page 1".to_string(),
                StampPlacement::TrailingPage => "stamped on a new last page".to_string(),
                StampPlacement::Skipped { reason } => format!("not stamped ({reason})"),
            };
            Ok(Summary {
                line: format!("{}  →  {}", placed, shown(&outcome.output)),
                json: serde_json::to_value(&outcome)?,
            })
        }

        Command::WordToPdf { input, output } => {
            let output = output
                .clone()
                .unwrap_or_else(|| input.with_extension("pdf"));
            let out = ops::word_to_pdf(input, &output, &PageLayout::default())
                .context("Word to PDF failed")?;
            let pages = ops::pdf::page_count(&out)?;
            Ok(Summary {
                line: format!("{} pages  →  {}", pages, shown(&out)),
                json: serde_json::json!({ "output": out, "pages": pages }),
            })
        }

        Command::PdfToWord { input, output, ocr } => {
            let output = output
                .clone()
                .unwrap_or_else(|| input.with_extension("docx"));
            let capability = if ocr.no_ocr {
                OcrCapability::disabled("disabled with --no-ocr")
            } else {
                OcrCapability::detect(&ocr_config(ocr))
            };
            let written = ops::pdf_to_word(input, &output, &capability, progress.as_ref())
                .await
                .context("PDF to Word failed")?;
            let via = match written.source {
                TextSource::Direct => "text layer",
                TextSource::Ocr => "OCR",
            };
            Ok(Summary {
                line: format!(
                    "{} paragraphs via {}  →  {}",
                    written.paragraphs,
                    via,
                    shown(&written.output)
                ),
                json: serde_json::to_value(&written)?,
            })
        }

        Command::Inspect { input } => {
            let info = ops::inspect(input).context("Failed to inspect PDF")?;
            if !cli.json {
                println!("File:         {}", input.display());
                if let Some(ref t) = info.title {
                    println!("Title:        {t}");
                }
                if let Some(ref a) = info.author {
                    println!("Author:       {a}");
                }
                println!("Pages:        {}", info.page_count);
                println!("PDF Version:  {}", info.pdf_version);
                println!("Encrypted:    {}", info.is_encrypted);
                println!(
                    "Text layer:   {}",
                    if info.has_text_layer { "yes" } else { "no (needs OCR)" }
                );
                if let Some(ref p) = info.producer {
                    println!("Producer:     {p}");
                }
            }
            Ok(Summary {
                line: format!("{} pages", info.page_count),
                json: serde_json::to_value(&info)?,
            })
        }
    }
}

/// Map OCR flags to `OcrConfig`.
fn ocr_config(args: &OcrArgs) -> OcrConfig {
    OcrConfig {
        provider_name: args.provider.clone(),
        model: args.model.clone(),
        pdfium_library_dir: args.pdfium_dir.clone(),
        concurrency: args.concurrency.max(1),
        max_retries: args.max_retries,
        max_rendered_pixels: args.max_pixels,
        ..OcrConfig::default()
    }
}

fn shown(path: &Path) -> String {
    bold(&path.display().to_string())
}
