//! CLI binary for edgequake-pdf2video.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2video::{
    convert, inspect, ConversionMode, Pdf2VideoError, PipelineConfig, PipelineProgressCallback,
    ProgressCallback, ProgressEvent, RenderServiceConfig, SegmentNotice, Stage, Tone,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

/// Terminal progress callback: a spinner per stage, switching to a
/// `ready/total` bar while clips render, plus one log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Stage currently shown and when it was entered.
    current: Mutex<Option<(Stage, Instant)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(None),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS)
    }

    fn clips_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} clips  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS)
    }

    /// Print a completion line for the stage being left, if any.
    fn finish_stage(&self, previous: Option<(Stage, Instant)>) {
        if let Some((stage, started)) = previous {
            self.bar.println(format!(
                "  {} {:<20} {}",
                green("✓"),
                stage.label(),
                dim(&format!("{:.1}s", started.elapsed().as_secs_f64())),
            ));
        }
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_progress(&self, event: ProgressEvent) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        let changed = current.map(|(s, _)| s) != Some(event.stage);

        if event.stage == Stage::Error {
            current.take();
            self.bar.finish_and_clear();
            return;
        }

        if changed {
            self.finish_stage(current.take());
            *current = Some((event.stage, Instant::now()));

            if event.stage == Stage::Done {
                self.bar.finish_and_clear();
                return;
            }
            self.bar.set_prefix(event.stage.label());
            if event.stage == Stage::GeneratingVideos && event.total > 0 {
                self.bar.set_style(Self::clips_style());
                self.bar.set_length(event.total as u64);
                self.bar.reset_elapsed();
            } else {
                self.bar.set_style(Self::spinner_style());
                self.bar.set_message("");
            }
        }

        if event.stage == Stage::GeneratingVideos && event.total > 0 {
            if self.bar.length() != Some(event.total as u64) {
                self.bar.set_style(Self::clips_style());
                self.bar.set_length(event.total as u64);
            }
            self.bar.set_position(event.ready as u64);
        }
    }

    fn on_segment_notice(&self, notice: &SegmentNotice) {
        self.bar
            .println(format!("  {} {}", yellow("⚠"), yellow(&notice.to_string())));
    }

    fn on_run_failed(&self, stage: Stage, message: &str) {
        self.bar.finish_and_clear();

        // Truncate very long error messages to keep output tidy.
        let msg = if message.chars().count() > 120 {
            let head: String = message.chars().take(119).collect();
            format!("{head}\u{2026}")
        } else {
            message.to_string()
        };
        eprintln!("  {} {:<20} {}", red("✗"), stage.label(), red(&msg));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One clip per page, presenter over each page (default mode)
  pdf2video deck.pdf

  # Write the video somewhere else
  pdf2video deck.pdf --output-dir ~/videos

  # A single two-minute casual summary
  pdf2video --mode summary --tone casual --duration 120 report.pdf

  # Convert from URL
  pdf2video https://arxiv.org/pdf/1706.03762

  # Use a specific model
  pdf2video --provider anthropic --model claude-sonnet-4-20250514 deck.pdf

  # Inspect a document (no API key needed)
  pdf2video --inspect-only deck.pdf

  # JSON result (scripts, segments, timings)
  pdf2video --json deck.pdf > run.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY            OpenAI API key
  ANTHROPIC_API_KEY         Anthropic API key
  GEMINI_API_KEY            Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           Override model ID
  PDF2VIDEO_RENDER_URL      Render service root (default https://tavusapi.com)
  PDF2VIDEO_RENDER_API_KEY  Render service API key
  PDF2VIDEO_REPLICA_ID      Presenter replica to render
  PDFIUM_LIB_PATH           Path to libpdfium (file or directory)

SETUP:
  1. Install ffmpeg and make sure it is on PATH (or pass --ffmpeg).
  2. Set keys:  export OPENAI_API_KEY=sk-...
                export PDF2VIDEO_RENDER_API_KEY=...  PDF2VIDEO_REPLICA_ID=...
  3. Convert:   pdf2video deck.pdf

  Rendering is slow. If the poll timeout is reached the run stops and the
  links to the clips still rendering are printed; they stay available on the
  render service.
"#;

/// Turn PDF documents into narrated talking-head videos.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2video",
    version,
    about = "Turn PDF documents into narrated talking-head videos",
    long_about = "Turn PDF documents (local files or URLs) into narrated videos. An LLM writes \
the narration, an avatar render service speaks it, and ffmpeg assembles the result: either a \
single summary clip or an intro followed by one clip per page with the presenter overlaid on \
the page.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Video kind: page-by-page or summary.
    #[arg(long, env = "PDF2VIDEO_MODE", value_enum, default_value = "page-by-page")]
    mode: ModeArg,

    /// Directory the finished video is written to.
    #[arg(short, long, env = "PDF2VIDEO_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Narration tone for summary mode: professional, casual, educational.
    #[arg(long, env = "PDF2VIDEO_TONE", value_enum, default_value = "professional")]
    tone: ToneArg,

    /// Target summary length in seconds.
    #[arg(long, env = "PDF2VIDEO_DURATION", default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(10..=1800))]
    duration: u32,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Render service API root.
    #[arg(long, env = "PDF2VIDEO_RENDER_URL")]
    render_url: Option<String>,

    /// Render service API key.
    #[arg(long, env = "PDF2VIDEO_RENDER_API_KEY", hide_env_values = true)]
    render_api_key: Option<String>,

    /// Presenter replica ID.
    #[arg(long, env = "PDF2VIDEO_REPLICA_ID")]
    replica_id: Option<String>,

    /// ffmpeg executable.
    #[arg(long, env = "PDF2VIDEO_FFMPEG", default_value = "ffmpeg")]
    ffmpeg: PathBuf,

    /// Seconds between render status sweeps.
    #[arg(long, env = "PDF2VIDEO_POLL_INTERVAL", default_value_t = 10)]
    poll_interval: u64,

    /// Give up waiting for renders after this many seconds.
    #[arg(long, env = "PDF2VIDEO_POLL_TIMEOUT", default_value_t = 600)]
    poll_timeout: u64,

    /// Concurrent render submissions and status queries.
    #[arg(short, long, env = "PDF2VIDEO_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Page rasterisation DPI (72–400).
    #[arg(long, env = "PDF2VIDEO_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PDF2VIDEO_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Retries per script on LLM failure.
    #[arg(long, env = "PDF2VIDEO_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// HTTP download timeout in seconds (document and clips).
    #[arg(long, env = "PDF2VIDEO_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the run result as JSON on stdout.
    #[arg(long, env = "PDF2VIDEO_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2VIDEO_NO_PROGRESS")]
    no_progress: bool,

    /// Print page count and text size only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2VIDEO_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2VIDEO_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    PageByPage,
    Summary,
}

impl From<ModeArg> for ConversionMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::PageByPage => ConversionMode::PageByPage,
            ModeArg::Summary => ConversionMode::Summary,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ToneArg {
    Professional,
    Casual,
    Educational,
}

impl From<ToneArg> for Tone {
    fn from(v: ToneArg) -> Self {
        match v {
            ToneArg::Professional => Tone::Professional,
            ToneArg::Casual => Tone::Casual,
            ToneArg::Educational => Tone::Educational,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar covers INFO-level feedback; keep library logs quiet
    // while it is shown.
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input).await.context("Failed to inspect PDF")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize document info")?
            );
        } else {
            println!("File:         {}", cli.input);
            println!("Pages:        {}", info.page_count);
            println!("Characters:   {}", info.character_count);
            if info.character_count == 0 {
                println!("{}", yellow("No text layer: this looks like a scanned document."));
            }
        }
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;
    let mode: ConversionMode = cli.mode.into();

    if !cli.quiet && !cli.json {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Creating a {mode} video from {}", cli.input))
        );
    }

    // ── Run conversion ───────────────────────────────────────────────────
    let output = match convert(&cli.input, mode, &config).await {
        Ok(output) => output,
        Err(err) => {
            if let Pdf2VideoError::RenderTimeout { elapsed_secs, pending } = &err.source {
                eprintln!(
                    "{} Still rendering after {}s. These clips stay available on the render service:",
                    yellow("⚠"),
                    elapsed_secs
                );
                for job in pending {
                    let link = job.hosted_url.as_deref().unwrap_or(&job.remote_job_id);
                    let label = if job.page_index == 0 {
                        "intro".to_string()
                    } else {
                        format!("page {}", job.page_index)
                    };
                    eprintln!("    {:<10} {}", label, cyan(link));
                }
                std::process::exit(2);
            }
            return Err(anyhow::Error::new(err)).context("Conversion failed");
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        println!("{}", output.video_path.display());
    }

    if !cli.quiet && !cli.json {
        let stats = &output.stats;
        eprintln!(
            "{}  {} segments ({} over pages)  {}ms  →  {}",
            green("✔"),
            stats.segments,
            stats.composited_segments,
            stats.total_duration_ms,
            bold(&output.video_path.display().to_string()),
        );
        eprintln!(
            "   {} sweeps  /  scripts {}ms  /  render {}ms  /  stitch {}ms",
            dim(&stats.poll_sweeps.to_string()),
            dim(&stats.script_duration_ms.to_string()),
            dim(&stats.render_duration_ms.to_string()),
            dim(&stats.stitch_duration_ms.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut render = RenderServiceConfig::from_env();
    if let Some(ref url) = cli.render_url {
        render.base_url = url.clone();
    }
    if let Some(ref key) = cli.render_api_key {
        render.api_key = key.clone();
    }
    if let Some(ref replica) = cli.replica_id {
        render.replica_id = replica.clone();
    }

    let mut builder = PipelineConfig::builder()
        .dpi(cli.dpi)
        .render_service(render)
        .submit_concurrency(cli.concurrency)
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .max_poll_duration(Duration::from_secs(cli.poll_timeout))
        .download_timeout_secs(cli.download_timeout)
        .ffmpeg_path(cli.ffmpeg.clone())
        .output_dir(cli.output_dir.clone())
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .tone(cli.tone.into())
        .target_duration_secs(cli.duration);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
