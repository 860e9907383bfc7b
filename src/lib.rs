//! # edgequake-pdf2video
//!
//! Turn PDF documents into narrated talking-head videos.
//!
//! ## Why this crate?
//!
//! A slide deck or report is easier to follow when someone walks you through
//! it. This crate reads the document, asks an LLM to write narration, has an
//! avatar render service speak it, and assembles the result with ffmpeg:
//! either one summary clip, or an intro followed by one clip per page with
//! the presenter overlaid on the page itself.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    full text + page count via pdfium (spawn_blocking)
//!  ├─ 3. Rasterise  one JPEG per page via pdfium (spawn_blocking)
//!  ├─ 4. Script     intro + per-page narration from the LLM
//!  ├─ 5. Render     submit every script, poll until all clips are ready
//!  ├─ 6. Stitch     composite clips over pages, normalise, concatenate
//!  └─ 7. Output     promote the final MP4; the run workspace is deleted
//! ```
//!
//! Render jobs finish in any order; the output is always intro, page 1,
//! page 2, … . A single failed render fails the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2video::{convert, ConversionMode, PipelineConfig, RenderServiceConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LLM provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = PipelineConfig::builder()
//!         .render_service(RenderServiceConfig::from_env())
//!         .output_dir("videos")
//!         .build()?;
//!     let output = convert("deck.pdf", ConversionMode::PageByPage, &config).await?;
//!     println!("{}", output.video_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2video` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-pdf2video = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! * **pdfium**: found through `PDFIUM_LIB_PATH` or the system library path.
//! * **ffmpeg**: `ffmpeg` on `PATH`, or [`PipelineConfig::ffmpeg_path`].
//! * **Render service**: `PDF2VIDEO_RENDER_URL`, `PDF2VIDEO_RENDER_API_KEY`,
//!   `PDF2VIDEO_REPLICA_ID` (see [`RenderServiceConfig::from_env`]).

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    MediaProfile, PipLayout, PipelineConfig, PipelineConfigBuilder, RenderServiceConfig, Tone,
};
pub use convert::{
    convert, convert_sync, convert_with, inspect, run_page_by_page_pipeline,
    run_summary_pipeline, ConversionMode,
};
pub use error::{PendingJob, PipelineError, Pdf2VideoError, SegmentNotice};
pub use output::{
    DocumentInfo, JobMap, MediaAsset, MediaRole, Page, PageScript, PipelineOutput, RenderJob,
    RenderJobUpdate, RenderStatus, RunStats, Script, SegmentKind, SegmentResult,
};
pub use pipeline::PipelineServices;
pub use progress::{
    NoopProgressCallback, PipelineProgressCallback, ProgressBroadcaster, ProgressCallback,
    ProgressEvent,
};
pub use run::{PipelineRun, Stage};
