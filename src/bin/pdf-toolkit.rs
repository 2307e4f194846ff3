//! CLI binary for pdf-toolkit.
//!
//! A thin shim over the library crate: maps flags to `ToolkitConfig` and
//! `ToolParameters`, drives one orchestrator run and writes the download.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_toolkit::{
    InputFile, Orchestrator, ParamValue, PageSequenceManager, ProcessingState, ProgressCallback,
    RunProgressCallback, Status, ToolId, ToolParameters, ToolkitConfig,
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Mirrors the published state on a 0–100 bar; logs each exported page above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, tool: ToolId, file_count: usize) {
        self.bar.set_prefix(tool.slug());
        self.bar.println(format!(
            "{} {}",
            bold("◆"),
            bold(&format!("{} on {file_count} file(s)", tool.descriptor().title))
        ));
    }

    fn on_state_change(&self, state: &ProcessingState) {
        self.bar.set_position(u64::from(state.progress));
        if let Some(msg) = &state.message {
            self.bar.set_message(msg.clone());
        }
    }

    fn on_page_rendered(&self, page_num: usize, total_pages: usize, encoded_len: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&format!("{:>8} bytes", encoded_len)),
        ));
    }

    fn on_run_complete(&self, _state: &ProcessingState) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List the available tools and their parameters
  pdf-toolkit tools

  # Page count and size of a PDF (no backend needed)
  pdf-toolkit inspect document.pdf

  # Every page as PNG, zipped
  pdf-toolkit run pdf-to-img document.pdf --format png -o pages.zip

  # Merge several PDFs
  pdf-toolkit run merge-pdf a.pdf b.pdf c.pdf -o merged.pdf

  # Split pages 2-5 into a new document
  pdf-toolkit run split-pdf report.pdf --param mode=range --param start_page=2 --param end_page=5

  # Stamp an image watermark
  pdf-toolkit run add-image-watermark doc.pdf --attach watermark=logo.png --param opacity=0.4

  # Reverse a document, then move its new last page to the front
  pdf-toolkit rearrange scan.pdf --reverse --move 10:1

ENVIRONMENT VARIABLES:
  PDF_TOOLKIT_API_URL       Base URL of the conversion backend
  PDF_TOOLKIT_TIMEOUT       Request timeout in seconds (default: none)
  PDF_TOOLKIT_EXPORT_SCALE  Render scale of bulk exports (default: 2.0)
  PDF_TOOLKIT_JPEG_QUALITY  JPEG quality of bulk exports (default: 90)
  PDFIUM_LIB_PATH           Path to libpdfium (file or directory)

Pages are numbered from 1 on the command line. Ctrl-C cancels a run.
"#;

/// PDF toolkit: local rasterisation plus remote conversion tools.
#[derive(Parser, Debug)]
#[command(
    name = "pdf-toolkit",
    version,
    about = "Convert, split, merge and rasterise PDF documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the conversion backend.
    #[arg(long, global = true, env = "PDF_TOOLKIT_API_URL")]
    api_url: Option<String>,

    /// Request timeout in seconds.
    #[arg(long, global = true, env = "PDF_TOOLKIT_TIMEOUT")]
    timeout: Option<u64>,

    /// Render scale of bulk exports (0–8).
    #[arg(long, global = true, env = "PDF_TOOLKIT_EXPORT_SCALE")]
    export_scale: Option<f32>,

    /// JPEG quality of bulk exports (1–100).
    #[arg(long, global = true, env = "PDF_TOOLKIT_JPEG_QUALITY",
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: Option<u8>,

    /// Path to libpdfium (file or directory).
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium: Option<PathBuf>,

    /// Print JSON instead of human-readable output.
    #[arg(long, global = true, env = "PDF_TOOLKIT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "PDF_TOOLKIT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF_TOOLKIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF_TOOLKIT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available tools.
    Tools,

    /// Print page count and size of a PDF.
    Inspect {
        file: PathBuf,

        /// User password for encrypted documents.
        #[arg(long, env = "PDF_TOOLKIT_PASSWORD")]
        password: Option<String>,
    },

    /// Run one tool over one or more files.
    Run {
        /// Tool slug, e.g. `compress-pdf` (see `pdf-toolkit tools`).
        tool: ToolId,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tool parameter, `name=value`. Repeatable.
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// File parameter, `name=path`. Repeatable.
        #[arg(long = "attach", value_name = "NAME=PATH")]
        attachments: Vec<String>,

        /// Image format for `pdf-to-img`.
        #[arg(long, value_parser = ["jpeg", "png"])]
        format: Option<String>,

        /// Write the result here instead of `<tool>.<ext>`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reorder the pages of a PDF.
    Rearrange {
        file: PathBuf,

        /// Reverse the page order first.
        #[arg(long)]
        reverse: bool,

        /// Move the page at position FROM to position TO (1-based). Repeatable,
        /// applied in order after `--reverse`.
        #[arg(long = "move", value_name = "FROM:TO")]
        moves: Vec<String>,

        /// Write the result here instead of `rearrange-pdf.pdf`.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose brings them back.
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

    match &cli.command {
        Command::Tools => print_tools(cli.json),
        Command::Inspect { file, password } => {
            let orchestrator = Orchestrator::new(build_config(&cli, None)?)
                .context("Failed to initialise")?;
            inspect(&orchestrator, file, password.as_deref(), cli.json).await
        }
        Command::Run {
            tool,
            files,
            params,
            attachments,
            format,
            output,
        } => {
            let descriptor = tool.descriptor();
            let inputs = read_inputs(files)?;
            let mut parameters = ToolParameters::new();
            for raw in params {
                let (name, value) = split_pair(raw)?;
                let spec = descriptor
                    .param(name)
                    .with_context(|| format!("'{tool}' has no parameter '{name}'"))?;
                let value = ParamValue::parse(spec.kind, value)
                    .map_err(|e| anyhow::anyhow!("Invalid value for '{name}': {e}"))?;
                parameters.set(name, value);
            }
            for raw in attachments {
                let (name, path) = split_pair(raw)?;
                let file = InputFile::from_path(Path::new(path))
                    .with_context(|| format!("Failed to read attachment '{name}'"))?;
                parameters.set(name, ParamValue::Attachment(file));
            }
            if let Some(format) = format {
                parameters.set("format", ParamValue::Text(format.clone()));
            }
            execute(
                &cli,
                *tool,
                inputs,
                parameters,
                output.as_deref(),
                show_progress,
            )
            .await
        }
        Command::Rearrange {
            file,
            reverse,
            moves,
            output,
        } => {
            let orchestrator = Orchestrator::new(build_config(&cli, None)?)
                .context("Failed to initialise")?;
            let input = InputFile::from_path(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let doc = orchestrator
                .rasterizer()
                .open(&input, None)
                .await
                .context("Failed to open PDF")?;

            let mut manager = PageSequenceManager::new();
            let sequence = manager.load(doc.page_count());
            if *reverse {
                sequence.reverse();
            }
            for raw in moves {
                let (from, to) = parse_move(raw)?;
                if !sequence.move_to(from, to) {
                    bail!(
                        "--move {raw}: position {} is out of range (document has {} pages)",
                        from + 1,
                        sequence.len()
                    );
                }
            }
            let order = sequence.as_slice().to_vec();
            if !cli.quiet && !cli.json {
                let display: Vec<String> = order.iter().map(|p| (p + 1).to_string()).collect();
                eprintln!("{} {}", dim("Page order:"), display.join(","));
            }

            let params = ToolParameters::new().with_page_order("page_order", order);
            execute(
                &cli,
                ToolId::RearrangePdf,
                vec![input],
                params,
                output.as_deref(),
                show_progress,
            )
            .await
        }
    }
}

/// Map global flags to `ToolkitConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ToolkitConfig> {
    let mut builder = ToolkitConfig::builder();
    if let Some(url) = &cli.api_url {
        builder = builder.api_base_url(url.clone());
    }
    if let Some(secs) = cli.timeout {
        builder = builder.request_timeout_secs(secs);
    }
    if let Some(scale) = cli.export_scale {
        builder = builder.export_scale(scale);
    }
    if let Some(quality) = cli.jpeg_quality {
        builder = builder.jpeg_quality(quality);
    }
    if let Some(path) = &cli.pdfium {
        builder = builder.pdfium_lib_path(path.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn read_inputs(paths: &[PathBuf]) -> Result<Vec<InputFile>> {
    paths
        .iter()
        .map(|p| InputFile::from_path(p).with_context(|| format!("Failed to read {}", p.display())))
        .collect()
}

/// Split `name=value`.
fn split_pair(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value)),
        _ => bail!("Expected NAME=VALUE, got '{raw}'"),
    }
}

/// Parse a 1-based `FROM:TO` into 0-based positions.
fn parse_move(raw: &str) -> Result<(usize, usize)> {
    let (from, to) = raw
        .split_once(':')
        .with_context(|| format!("Expected FROM:TO, got '{raw}'"))?;
    let parse = |s: &str| -> Result<usize> {
        let n: usize = s
            .trim()
            .parse()
            .with_context(|| format!("Invalid position '{}' in --move {raw}", s.trim()))?;
        if n < 1 {
            bail!("Positions are 1-indexed, minimum is 1 (got {n})");
        }
        Ok(n - 1)
    };
    Ok((parse(from)?, parse(to)?))
}

fn print_tools(json: bool) -> Result<()> {
    if json {
        let tools: Vec<_> = ToolId::ALL
            .iter()
            .map(|id| {
                let d = id.descriptor();
                serde_json::json!({
                    "id": id,
                    "title": d.title,
                    "description": d.description,
                    "local": d.is_local(),
                    "params": d.params.iter().map(|p| serde_json::json!({
                        "name": p.name,
                        "required": p.required,
                        "default": p.default,
                    })).collect::<Vec<_>>(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&tools).context("Failed to serialise tools")?
        );
        return Ok(());
    }

    for id in ToolId::ALL {
        let d = id.descriptor();
        println!("{:<24} {}", bold(id.slug()), d.description);
        for p in d.params {
            let note = match (p.required, p.default) {
                (true, _) => "required".to_string(),
                (false, Some(default)) => format!("default {default}"),
                (false, None) => "optional".to_string(),
            };
            println!("  {:<22} {}", format!("--param {}", p.name), dim(&note));
        }
    }
    Ok(())
}

async fn inspect(
    orchestrator: &Orchestrator,
    path: &Path,
    password: Option<&str>,
    json: bool,
) -> Result<()> {
    let input = InputFile::from_path(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let doc = orchestrator
        .rasterizer()
        .open(&input, password)
        .await
        .context("Failed to inspect PDF")?;

    if json {
        let meta = serde_json::json!({
            "file": doc.name(),
            "pages": doc.page_count(),
            "size": doc.size(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialise metadata")?
        );
    } else {
        println!("File:   {}", doc.name());
        println!("Pages:  {}", doc.page_count());
        println!("Size:   {} bytes", doc.size());
    }
    Ok(())
}

/// Run `tool`, wire Ctrl-C to cancellation and write the download.
async fn execute(
    cli: &Cli,
    tool: ToolId,
    files: Vec<InputFile>,
    params: ToolParameters,
    output: Option<&Path>,
    show_progress: bool,
) -> Result<()> {
    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RunProgressCallback>)
    } else {
        None
    };
    let orchestrator = Arc::new(
        Orchestrator::new(build_config(cli, progress)?).context("Failed to initialise")?,
    );

    let watcher = Arc::clone(&orchestrator);
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });
    let state = orchestrator.run(tool, files, params).await;
    ctrl_c.abort();
    let state = state.context("Run rejected")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&state).context("Failed to serialise state")?
        );
    }

    match state.status {
        Status::Success => {}
        Status::Idle => {
            if !cli.quiet {
                eprintln!("{} Cancelled", red("✘"));
            }
            std::process::exit(130);
        }
        _ => bail!(
            "{}",
            state
                .message
                .unwrap_or_else(|| "Processing failed".to_string())
        ),
    }

    let download = state
        .download
        .as_ref()
        .context("Run succeeded without a download")?;
    let blob = orchestrator
        .blobs()
        .get(&download.url)
        .context("Result is no longer available")?;
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&download.file_name));
    blob.save(&path).await?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}  {}  →  {}",
            green("✔"),
            state.message.as_deref().unwrap_or("Done"),
            bold(&path.display().to_string()),
        );
        if let (Some(before), Some(after)) = (state.original_size, state.result_size) {
            eprintln!(
                "   {} bytes  →  {} bytes",
                dim(&before.to_string()),
                dim(&after.to_string())
            );
        }
    }
    orchestrator.reset();
    Ok(())
}
