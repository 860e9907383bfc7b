//! Pipeline entry points.
//!
//! ## Two ways in
//!
//! * [`convert`] takes a path or URL, loads and extracts the document, then
//!   runs the pipeline for the chosen [`ConversionMode`]. This is what the
//!   CLI calls.
//! * [`run_page_by_page_pipeline`] and [`run_summary_pipeline`] take text
//!   that the caller already extracted, plus a [`PipelineServices`] bundle,
//!   and run one pipeline. Tests drive these with fake collaborators.
//!
//! ## Run lifecycle
//!
//! Every run owns a fresh [`Workspace`] and a [`PipelineRun`]. Whatever
//! happens inside the stages, the workspace is closed before returning, so
//! only the promoted video (on success) survives the run.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Pdf2VideoError};
use crate::output::{
    DocumentInfo, Page, PageScript, PipelineOutput, RunStats, SegmentKind, SegmentResult,
    INTRO_INDEX,
};
use crate::pipeline::extract::document_info;
use crate::pipeline::poll::{poll_until_complete, submit_all, PollSettings};
use crate::pipeline::split::split_text_by_page;
use crate::pipeline::stitch::stitch;
use crate::pipeline::workspace::{output_file_name, Workspace};
use crate::pipeline::{input, PipelineServices};
use crate::run::{PipelineRun, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which kind of video to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionMode {
    /// One presenter clip summarising the whole document.
    Summary,
    /// An intro, then one clip per page composited over the page image.
    #[default]
    PageByPage,
}

impl ConversionMode {
    /// Stage a run of this mode starts in.
    pub fn first_stage(self) -> Stage {
        match self {
            ConversionMode::Summary => Stage::GeneratingScripts,
            ConversionMode::PageByPage => Stage::RasterizingPages,
        }
    }
}

impl fmt::Display for ConversionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConversionMode::Summary => "summary",
            ConversionMode::PageByPage => "page-by-page",
        })
    }
}

/// Convert a PDF file or URL to a narrated video.
///
/// This is the primary entry point for the library. The production
/// collaborators (pdfium, the configured LLM, the HTTP render service and
/// ffmpeg) are built from `config`.
///
/// # Errors
/// A single [`PipelineError`] naming the stage that failed. Problems loading
/// or reading the document are reported against the mode's first stage.
pub async fn convert(
    input_str: impl AsRef<str>,
    mode: ConversionMode,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    let services = PipelineServices::from_config(config)
        .map_err(|e| fail_before_run(config, mode.first_stage(), e))?;
    convert_with(input_str, mode, config, &services).await
}

/// [`convert`] with caller-supplied collaborators.
pub async fn convert_with(
    input_str: impl AsRef<str>,
    mode: ConversionMode,
    config: &PipelineConfig,
    services: &PipelineServices,
) -> Result<PipelineOutput, PipelineError> {
    let input_str = input_str.as_ref();
    info!("Starting {} conversion: {}", mode, input_str);
    let first = mode.first_stage();

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let bytes = input::load_document(input_str, config.download_timeout_secs)
        .await
        .map_err(|e| fail_before_run(config, first, e))?;

    // ── Step 2: Extract text ─────────────────────────────────────────────
    let extracted = services
        .extractor
        .extract(&bytes)
        .await
        .map_err(|e| fail_before_run(config, first, e))?;

    // ── Step 3: Run the pipeline ─────────────────────────────────────────
    match mode {
        ConversionMode::PageByPage => {
            run_page_by_page_pipeline(
                &bytes,
                &extracted.full_text,
                extracted.page_count,
                config,
                services,
            )
            .await
        }
        ConversionMode::Summary => {
            run_summary_pipeline(&extracted.full_text, config, services).await
        }
    }
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    mode: ConversionMode,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PipelineError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| {
            PipelineError::new(
                mode.first_stage(),
                Pdf2VideoError::Internal(format!("Failed to create tokio runtime: {}", e)),
            )
        })?
        .block_on(convert(input_str, mode, config))
}

/// Page count and text size of a document.
///
/// Contacts no service and needs no API key.
pub async fn inspect(input_str: impl AsRef<str>) -> Result<DocumentInfo, Pdf2VideoError> {
    let bytes = input::load_document(input_str.as_ref(), 120).await?;
    document_info(&bytes).await
}

/// Run the page-by-page pipeline on an already extracted document.
///
/// `RasterizingPages → GeneratingScripts → GeneratingVideos → Stitching → Done`
///
/// Returns the promoted video. On failure nothing is left on disk.
pub async fn run_page_by_page_pipeline(
    document: &[u8],
    full_text: &str,
    page_count: usize,
    config: &PipelineConfig,
    services: &PipelineServices,
) -> Result<PipelineOutput, PipelineError> {
    let (mut run, workspace) = start_run(config, Stage::RasterizingPages)?;
    let result = drive_page_by_page(
        &mut run, &workspace, document, full_text, page_count, config, services,
    )
    .await;
    finish_run(run, workspace, result)
}

/// Run the summary pipeline: one script, one clip.
///
/// `GeneratingScripts → GeneratingVideos → Stitching → Done`
pub async fn run_summary_pipeline(
    full_text: &str,
    config: &PipelineConfig,
    services: &PipelineServices,
) -> Result<PipelineOutput, PipelineError> {
    let (mut run, workspace) = start_run(config, Stage::GeneratingScripts)?;
    let result = drive_summary(&mut run, &workspace, full_text, config, services).await;
    finish_run(run, workspace, result)
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Finished {
    scripts: Vec<PageScript>,
    segments: Vec<SegmentResult>,
    stats: RunStats,
}

fn fail_before_run(config: &PipelineConfig, stage: Stage, source: Pdf2VideoError) -> PipelineError {
    warn!(stage = %stage, error = %source, "Run could not start");
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_failed(stage, &source.user_message());
    }
    PipelineError::new(stage, source)
}

fn start_run(config: &PipelineConfig, first: Stage) -> Result<(PipelineRun, Workspace), PipelineError> {
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let workspace = Workspace::create(config.work_root.as_deref(), &run_id)
        .map_err(|e| fail_before_run(config, first, e))?;
    let run = PipelineRun::new(
        run_id,
        first,
        workspace.path().to_path_buf(),
        config.progress_callback.clone(),
    );
    Ok((run, workspace))
}

fn finish_run(
    mut run: PipelineRun,
    workspace: Workspace,
    result: Result<Finished, Pdf2VideoError>,
) -> Result<PipelineOutput, PipelineError> {
    let outcome = match result {
        Ok(finished) => match run.advance(Stage::Done) {
            Ok(()) => Ok(finished),
            Err(e) => Err(run.fail(e)),
        },
        Err(e) => Err(run.fail(e)),
    };

    let work_dir = workspace.path().to_path_buf();
    if let Err(e) = workspace.close() {
        warn!(run_id = %run.run_id, "Workspace cleanup failed: {}", e);
    } else {
        debug!("Workspace {} removed", work_dir.display());
    }

    let finished = outcome?;
    let video_path = run.output_path.clone().ok_or_else(|| {
        PipelineError::new(
            Stage::Done,
            Pdf2VideoError::Internal("no output path recorded".into()),
        )
    })?;
    info!(run_id = %run.run_id, "Video ready: {}", video_path.display());
    Ok(PipelineOutput {
        run_id: run.run_id,
        video_path,
        scripts: finished.scripts,
        segments: finished.segments,
        stats: finished.stats,
    })
}

async fn drive_page_by_page(
    run: &mut PipelineRun,
    workspace: &Workspace,
    document: &[u8],
    full_text: &str,
    page_count: usize,
    config: &PipelineConfig,
    services: &PipelineServices,
) -> Result<Finished, Pdf2VideoError> {
    let total_start = Instant::now();
    let mut stats = RunStats::default();

    // ── Step 1: Rasterise pages ──────────────────────────────────────────
    let start = Instant::now();
    let rasterized = services
        .rasterizer
        .rasterize(document, &workspace.pages_dir())
        .await?;
    if rasterized.count != page_count {
        warn!(
            run_id = %run.run_id,
            "Rasterised {} pages but the text reports {}",
            rasterized.count, page_count
        );
    }
    run.pages = std::iter::once(Page::intro())
        .chain(rasterized.paths.into_iter().enumerate().map(|(i, path)| Page {
            index: i + 1,
            image_path: Some(path),
        }))
        .collect();
    stats.page_count = rasterized.count;
    stats.rasterize_duration_ms = start.elapsed().as_millis() as u64;
    info!(run_id = %run.run_id, "Rendered {} pages in {}ms", rasterized.count, stats.rasterize_duration_ms);

    // ── Step 2: Narration ────────────────────────────────────────────────
    run.advance(Stage::GeneratingScripts)?;
    let start = Instant::now();
    let text_by_page = split_text_by_page(full_text, page_count);
    debug!("Split text into {} segments", text_by_page.len());
    let scripts = services
        .scripts
        .generate_for_pages(&text_by_page, full_text)
        .await?;
    if !scripts.iter().any(|s| s.page_index == INTRO_INDEX) {
        return Err(Pdf2VideoError::ScriptGenerationFailed {
            message: "no intro script was produced".into(),
        });
    }
    stats.script_duration_ms = start.elapsed().as_millis() as u64;

    // ── Step 3 + 4: Render and stitch ────────────────────────────────────
    let segments = render_and_stitch(run, workspace, &scripts, config, services, &mut stats).await?;

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(Finished {
        scripts,
        segments,
        stats,
    })
}

async fn drive_summary(
    run: &mut PipelineRun,
    workspace: &Workspace,
    full_text: &str,
    config: &PipelineConfig,
    services: &PipelineServices,
) -> Result<Finished, Pdf2VideoError> {
    let total_start = Instant::now();
    let mut stats = RunStats::default();

    let start = Instant::now();
    let script = services
        .scripts
        .generate(full_text, config.tone, config.target_duration_secs)
        .await?;
    info!(
        run_id = %run.run_id,
        "Summary script: {} words, ~{}s",
        script.word_count, script.estimated_duration_secs
    );
    stats.script_duration_ms = start.elapsed().as_millis() as u64;
    run.pages = vec![Page::intro()];

    let scripts = vec![PageScript {
        page_index: INTRO_INDEX,
        script: script.text,
    }];
    let segments = render_and_stitch(run, workspace, &scripts, config, services, &mut stats).await?;

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    Ok(Finished {
        scripts,
        segments,
        stats,
    })
}

/// `GeneratingVideos` and `Stitching`, shared by both modes.
async fn render_and_stitch(
    run: &mut PipelineRun,
    workspace: &Workspace,
    scripts: &[PageScript],
    config: &PipelineConfig,
    services: &PipelineServices,
    stats: &mut RunStats,
) -> Result<Vec<SegmentResult>, Pdf2VideoError> {
    // ── Render ───────────────────────────────────────────────────────────
    run.advance(Stage::GeneratingVideos)?;
    let start = Instant::now();
    run.jobs = submit_all(services.renderer.as_ref(), scripts, config.submit_concurrency).await?;
    run.report_sweep(0, run.jobs.len());
    stats.poll_sweeps = poll_until_complete(
        services.renderer.as_ref(),
        run,
        PollSettings::from_config(config),
    )
    .await?;
    stats.render_duration_ms = start.elapsed().as_millis() as u64;

    // ── Stitch ───────────────────────────────────────────────────────────
    run.advance(Stage::Stitching)?;
    let start = Instant::now();
    let outcome = stitch(
        services.renderer.as_ref(),
        services.media.as_ref(),
        workspace,
        &run.jobs,
        &run.pages,
        config.progress_callback.as_ref(),
    )
    .await?;
    let promoted = workspace
        .promote(
            &outcome.artifact,
            &config.output_dir,
            &output_file_name(&run.run_id),
        )
        .await?;
    run.output_path = Some(promoted);
    stats.stitch_duration_ms = start.elapsed().as_millis() as u64;

    stats.segments = outcome.segments.len();
    stats.composited_segments = outcome
        .segments
        .iter()
        .filter(|s| s.kind == SegmentKind::Composited)
        .count();
    Ok(outcome.segments)
}
