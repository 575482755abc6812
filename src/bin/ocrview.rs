//! CLI binary for ocrview.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `UploaderConfig` and prints rendered results.

use anyhow::{Context, Result};
use clap::Parser;
use ocrview::{
    recognize_to_file, render, Engine, OutputFormat, OverlapPolicy, PreviewInfo,
    RecognitionResult, SubmissionObserver, UploadError, Uploader, UploaderConfig,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
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

// ── Spinner observer using indicatif ─────────────────────────────────────────

/// Shows a spinner while a request is in flight and one summary line per
/// finished submission.
struct CliSpinner {
    bar: ProgressBar,
}

impl CliSpinner {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }
}

impl SubmissionObserver for CliSpinner {
    fn on_submit_start(&self, file_name: &str, engine: Engine) {
        self.bar.reset_elapsed();
        self.bar.set_prefix("Recognising");
        self.bar.set_message(format!("{file_name} with {}", engine.label()));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_preview_ready(&self, preview: &PreviewInfo) {
        if let Some((w, h)) = preview.dimensions {
            self.bar
                .println(format!("  {} {}×{}", dim(&preview.file_name), w, h));
        }
    }

    fn on_complete(&self, result: &RecognitionResult) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} fragments  {}  {}",
            green("✔"),
            bold(&result.items.len().to_string()),
            cyan(result.engine.label()),
            dim(&format!("mean {:.1}%", result.mean_confidence().unwrap_or(0.0))),
        );
    }

    fn on_error(&self, error: &UploadError) {
        self.bar.finish_and_clear();
        if error.is_reportable() {
            eprintln!("{} {}", red("✘"), red(&error.to_string()));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise an image with the default (local) engine
  ocrview receipt.png

  # Use EasyOCR and print plain text
  ocrview --engine easyocr --format plain receipt.png

  # Write a standalone HTML page with the image embedded
  ocrview --format html --embed-preview receipt.png -o receipt.html

  # Point at another service
  ocrview --endpoint http://ocr.internal:5000/ocr scan.jpg

  # Interactive session
  ocrview --interactive

INTERACTIVE COMMANDS:
  engine <local|easyocr>   Select the engine for the next submission
  open <path>              Submit a file (file picker)
  drop <path> [path…]      Submit the first of several dropped files
  drag / leave             Toggle the drop-zone highlight
  show                     Re-render the current state
  quit                     Exit

SERVICE CONTRACT:
  POST <endpoint> multipart/form-data
    file    image bytes
    engine  local | easyocr
  Response: {"engine": "...", "result": [{"text": "...", "confidence": 0-100}, ...]}
        or: {"error": "..."}

ENVIRONMENT VARIABLES:
  OCRVIEW_ENDPOINT   Recognition service URL (default http://localhost:5000/ocr)
  OCRVIEW_ENGINE     Default engine (local, easyocr)
  OCRVIEW_TIMEOUT    Request timeout in seconds
  RUST_LOG           Override the log filter
"#;

/// Submit images to an OCR service and view confidence-coloured results.
#[derive(Parser, Debug)]
#[command(
    name = "ocrview",
    version,
    about = "Submit images to an OCR service and view confidence-coloured results",
    long_about = "Upload an image to an OCR recognition service, choosing the local model or \
EasyOCR, and render each recognised fragment coloured from red (0% confidence) to green (100%).",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file to recognise. Omit with --interactive.
    #[arg(required_unless_present = "interactive")]
    image: Option<PathBuf>,

    /// Recognition engine.
    #[arg(short, long, env = "OCRVIEW_ENGINE", value_enum, default_value = "local")]
    engine: EngineArg,

    /// Recognition service URL.
    #[arg(long, env = "OCRVIEW_ENDPOINT", default_value = ocrview::config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Request timeout in seconds.
    #[arg(long, env = "OCRVIEW_TIMEOUT", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Refuse images larger than this many bytes.
    #[arg(long, env = "OCRVIEW_MAX_UPLOAD_BYTES", default_value_t = ocrview::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Output format.
    #[arg(short, long, env = "OCRVIEW_FORMAT", value_enum, default_value = "ansi")]
    format: FormatArg,

    /// Write the rendered result to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Embed the image as a data: URL in HTML output.
    #[arg(long)]
    embed_preview: bool,

    /// Read commands from stdin and re-render on every state change.
    #[arg(short, long)]
    interactive: bool,

    /// In interactive mode, refuse a new submission while one is running
    /// instead of cancelling the older one.
    #[arg(long)]
    reject_while_busy: bool,

    /// Disable the spinner.
    #[arg(long, env = "OCRVIEW_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "OCRVIEW_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Local,
    Easyocr,
}

impl From<EngineArg> for Engine {
    fn from(v: EngineArg) -> Self {
        match v {
            EngineArg::Local => Engine::Local,
            EngineArg::Easyocr => Engine::EasyOcr,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Ansi,
    Plain,
    Html,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Ansi => OutputFormat::Ansi,
            FormatArg::Plain => OutputFormat::Plain,
            FormatArg::Html => OutputFormat::Html,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers progress feedback, so library INFO logs are muted
    // unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.interactive;
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

    let config = build_config(&cli, show_progress)?;
    let format: OutputFormat = cli.format.into();

    if cli.interactive {
        return run_interactive(config, format).await;
    }

    let Some(ref image) = cli.image else {
        anyhow::bail!("No image given");
    };

    // ── File output ──────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let result = recognize_to_file(image, output_path, config.default_engine, format, &config)
            .await
            .context("Recognition failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} fragments  →  {}",
                green("✔"),
                result.items.len(),
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Stdout ───────────────────────────────────────────────────────────
    let uploader = Uploader::new(config).context("Invalid configuration")?;
    let outcome = uploader.pick_file(image).await;
    let snapshot = uploader.snapshot();

    let rendered = if format == OutputFormat::Html && cli.embed_preview {
        let src = match snapshot.upload.preview.as_ref() {
            Some(p) => Some(
                ocrview::pipeline::preview::data_url(p)
                    .await
                    .context("Failed to embed preview")?,
            ),
            None => None,
        };
        render::to_html(
            render::render_result(snapshot.result.as_deref()).as_ref(),
            src.as_deref(),
        )
    } else {
        render::render(&snapshot, format)?
    };
    uploader.shutdown();

    // A failed submission still renders its status (error banner), then
    // exits non-zero.
    if outcome.is_ok() || matches!(format, OutputFormat::Ansi | OutputFormat::Plain) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .context("Failed to write to stdout")?;
        if !rendered.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    outcome.context("Recognition failed")?;
    Ok(())
}

/// Map CLI args to `UploaderConfig`.
fn build_config(cli: &Cli, show_progress: bool) -> Result<UploaderConfig> {
    let overlap = if cli.reject_while_busy {
        OverlapPolicy::RejectWhileBusy
    } else {
        OverlapPolicy::CancelPrevious
    };

    let mut builder = UploaderConfig::builder()
        .endpoint(cli.endpoint.clone())
        .default_engine(cli.engine.into())
        .request_timeout_secs(cli.timeout)
        .max_upload_bytes(cli.max_upload_bytes)
        .overlap(overlap);

    if show_progress {
        builder = builder.observer(CliSpinner::new());
    }

    builder.build().context("Invalid configuration")
}

// ── Interactive mode ─────────────────────────────────────────────────────────

enum Command {
    Engine(Engine),
    Open(PathBuf),
    Drop(Vec<PathBuf>),
    Drag,
    Leave,
    Show,
    Quit,
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match head.to_lowercase().as_str() {
        "engine" => {
            let name = rest.first().context("usage: engine <local|easyocr>")?;
            Command::Engine(name.parse()?)
        }
        "open" | "pick" => {
            if rest.is_empty() {
                anyhow::bail!("usage: open <path>");
            }
            Command::Open(PathBuf::from(rest.join(" ")))
        }
        "drop" => Command::Drop(rest.iter().map(PathBuf::from).collect()),
        "drag" => Command::Drag,
        "leave" => Command::Leave,
        "show" => Command::Show,
        "quit" | "exit" | "q" => Command::Quit,
        other => anyhow::bail!("unknown command '{other}'"),
    };
    Ok(Some(cmd))
}

async fn run_interactive(config: UploaderConfig, format: OutputFormat) -> Result<()> {
    let uploader = Uploader::new(config).context("Invalid configuration")?;

    // Every published snapshot is rendered once, in order.
    let mut changes = WatchStream::new(uploader.subscribe());
    let renderer = tokio::spawn(async move {
        while let Some(snapshot) = changes.next().await {
            match render::render(&snapshot, format) {
                Ok(out) => println!("{out}"),
                Err(e) => eprintln!("{} {e}", red("✘")),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let cmd = match parse_command(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{} {e}", red("✘"));
                continue;
            }
        };

        match cmd {
            Command::Engine(engine) => uploader.select_engine(engine),
            Command::Open(path) => {
                let up = uploader.clone();
                tokio::spawn(async move {
                    // Outcome is published through the snapshot stream.
                    let _ = up.pick_file(path).await;
                });
            }
            Command::Drop(paths) => {
                let up = uploader.clone();
                tokio::spawn(async move {
                    let _ = up.drop_files(&paths).await;
                });
            }
            Command::Drag => uploader.drag_enter(),
            Command::Leave => uploader.drag_leave(),
            Command::Show => println!("{}", render::render(&uploader.snapshot(), format)?),
            Command::Quit => break,
        }
    }

    uploader.shutdown();
    renderer.abort();
    Ok(())
}
