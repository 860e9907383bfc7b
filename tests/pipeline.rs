//! Pipeline integration tests with in-process collaborators.
//!
//! Every external system (pdfium, the LLM, the render service, ffmpeg) is
//! replaced by a fake, so these run anywhere without keys or binaries. The
//! tokio clock is paused; poll intervals elapse instantly.

use async_trait::async_trait;
use edgequake_pdf2video::pipeline::{
    ExtractedText, MediaTool, PageRasterizer, RasterizedPages, RenderService, ScriptGenerator,
    TextExtractor,
};
use edgequake_pdf2video::{
    convert_with, run_page_by_page_pipeline, run_summary_pipeline, ConversionMode, PageScript,
    Pdf2VideoError, PipelineConfig, PipelineProgressCallback, PipelineServices, ProgressEvent,
    RenderJobUpdate, RenderStatus, Script, SegmentKind, SegmentNotice, Stage, Tone,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ── Fakes ────────────────────────────────────────────────────────────────────

struct FakeExtractor {
    text: String,
    pages: usize,
}

#[async_trait]
impl TextExtractor for FakeExtractor {
    async fn extract(&self, _document: &[u8]) -> Result<ExtractedText, Pdf2VideoError> {
        Ok(ExtractedText {
            full_text: self.text.clone(),
            page_count: self.pages,
        })
    }
}

/// Writes `page-N.jpg` for every page except `skip`, but reports all paths.
struct FakeRasterizer {
    pages: usize,
    skip: Option<usize>,
}

#[async_trait]
impl PageRasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        _document: &[u8],
        out_dir: &Path,
    ) -> Result<RasterizedPages, Pdf2VideoError> {
        std::fs::create_dir_all(out_dir).unwrap();
        let mut paths = Vec::new();
        for n in 1..=self.pages {
            let path = out_dir.join(format!("page-{n}.jpg"));
            if self.skip != Some(n) {
                std::fs::write(&path, b"jpeg").unwrap();
            }
            paths.push(path);
        }
        Ok(RasterizedPages {
            count: self.pages,
            paths,
        })
    }
}

#[derive(Default)]
struct FakeScripts {
    fail: bool,
    seen_pages: Mutex<Vec<String>>,
}

#[async_trait]
impl ScriptGenerator for FakeScripts {
    async fn generate(
        &self,
        source: &str,
        tone: Tone,
        target_duration_secs: u32,
    ) -> Result<Script, Pdf2VideoError> {
        if self.fail {
            return Err(Pdf2VideoError::ScriptGenerationFailed {
                message: "model unavailable".into(),
            });
        }
        let text = format!("A {tone} {target_duration_secs}s summary of {} chars.", source.len());
        Ok(Script {
            word_count: text.split_whitespace().count(),
            estimated_duration_secs: 5,
            text,
        })
    }

    async fn generate_for_pages(
        &self,
        text_by_page: &[String],
        _full_text: &str,
    ) -> Result<Vec<PageScript>, Pdf2VideoError> {
        if self.fail {
            return Err(Pdf2VideoError::ScriptGenerationFailed {
                message: "model unavailable".into(),
            });
        }
        *self.seen_pages.lock().unwrap() = text_by_page.to_vec();
        let mut scripts = vec![PageScript {
            page_index: 0,
            script: "Welcome.".into(),
        }];
        scripts.extend((1..=text_by_page.len()).map(|i| PageScript {
            page_index: i,
            script: format!("Narration for page {i}."),
        }));
        Ok(scripts)
    }
}

/// Job ids are derived from labels (`intro`, `page-1`, …). Each job turns
/// `Ready` after the configured number of status queries; a job listed in
/// `failing` reports `Failed` on its first query.
#[derive(Default)]
struct FakeRenderer {
    ready_after: HashMap<String, usize>,
    failing: HashMap<String, String>,
    never_ready: Vec<String>,
    queries: Mutex<HashMap<String, usize>>,
    submitted: Mutex<Vec<(String, String)>>,
    downloads: Mutex<Vec<String>>,
}

impl FakeRenderer {
    fn job_id(label: &str) -> String {
        label.to_lowercase().replace(' ', "-")
    }

    /// The intro finishes last, the last page first.
    fn reverse_order(pages: usize) -> Self {
        let mut ready_after = HashMap::new();
        ready_after.insert("intro".to_string(), pages + 1);
        for i in 1..=pages {
            ready_after.insert(format!("page-{i}"), pages + 1 - i);
        }
        Self {
            ready_after,
            ..Default::default()
        }
    }
}

#[async_trait]
impl RenderService for FakeRenderer {
    async fn submit(&self, script: &str, label: &str) -> Result<String, Pdf2VideoError> {
        let id = Self::job_id(label);
        self.submitted
            .lock()
            .unwrap()
            .push((id.clone(), script.to_string()));
        Ok(id)
    }

    async fn status(&self, remote_job_id: &str) -> Result<RenderJobUpdate, Pdf2VideoError> {
        let n = {
            let mut queries = self.queries.lock().unwrap();
            let n = queries.entry(remote_job_id.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let hosted_url = Some(format!("https://render.example/v/{remote_job_id}"));

        if let Some(message) = self.failing.get(remote_job_id) {
            return Ok(RenderJobUpdate {
                status: RenderStatus::Failed,
                hosted_url,
                download_url: None,
                error_message: Some(message.clone()),
            });
        }
        let ready = !self.never_ready.iter().any(|id| id == remote_job_id)
            && n >= self.ready_after.get(remote_job_id).copied().unwrap_or(1);
        Ok(RenderJobUpdate {
            status: if ready {
                RenderStatus::Ready
            } else {
                RenderStatus::Generating
            },
            hosted_url,
            download_url: ready.then(|| format!("https://cdn.example/{remote_job_id}.mp4")),
            error_message: None,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), Pdf2VideoError> {
        self.downloads.lock().unwrap().push(url.to_string());
        tokio::fs::write(dest, b"raw clip").await.unwrap();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMedia {
    calls: Mutex<Vec<String>>,
    manifest: Mutex<String>,
    /// Write a truncated output, then report a concat failure.
    fail_concat: AtomicBool,
}

fn file_name(p: &Path) -> String {
    p.file_name().unwrap().to_string_lossy().into_owned()
}

#[async_trait]
impl MediaTool for RecordingMedia {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), Pdf2VideoError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("normalize {}", file_name(input)));
        tokio::fs::write(output, b"normalized").await.unwrap();
        Ok(())
    }

    async fn composite(
        &self,
        background: &Path,
        foreground: &Path,
        output: &Path,
    ) -> Result<(), Pdf2VideoError> {
        self.calls.lock().unwrap().push(format!(
            "composite {} {}",
            file_name(background),
            file_name(foreground)
        ));
        tokio::fs::write(output, b"composited").await.unwrap();
        Ok(())
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), Pdf2VideoError> {
        let list = tokio::fs::read_to_string(manifest).await.unwrap();
        self.calls
            .lock()
            .unwrap()
            .push(format!("concat {}", list.lines().count()));
        *self.manifest.lock().unwrap() = list;
        if self.fail_concat.load(Ordering::SeqCst) {
            tokio::fs::write(output, b"final vi").await.unwrap();
            return Err(Pdf2VideoError::ConcatFailed {
                exit_code: Some(1),
                timed_out: false,
                stderr: "Non-monotonous DTS in output stream".into(),
            });
        }
        tokio::fs::write(output, b"final video").await.unwrap();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
    notices: Mutex<Vec<SegmentNotice>>,
    failures: Mutex<Vec<(Stage, String)>>,
}

impl PipelineProgressCallback for RecordingProgress {
    fn on_progress(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn on_segment_notice(&self, notice: &SegmentNotice) {
        self.notices.lock().unwrap().push(notice.clone());
    }

    fn on_run_failed(&self, stage: Stage, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((stage, message.to_string()));
    }
}

impl RecordingProgress {
    /// Distinct stages in the order they were first reported.
    fn stages(&self) -> Vec<Stage> {
        let mut stages: Vec<Stage> = Vec::new();
        for e in self.events.lock().unwrap().iter() {
            if stages.last() != Some(&e.stage) {
                stages.push(e.stage);
            }
        }
        stages
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

struct Harness {
    work_root: TempDir,
    output_dir: TempDir,
    scripts: Arc<FakeScripts>,
    renderer: Arc<FakeRenderer>,
    media: Arc<RecordingMedia>,
    progress: Arc<RecordingProgress>,
    services: PipelineServices,
    config: PipelineConfig,
}

impl Harness {
    fn new(pages: usize, skip_image: Option<usize>, renderer: FakeRenderer, scripts: FakeScripts) -> Self {
        let work_root = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        let scripts = Arc::new(scripts);
        let renderer = Arc::new(renderer);
        let media = Arc::new(RecordingMedia::default());
        let progress = Arc::new(RecordingProgress::default());

        let services = PipelineServices {
            extractor: Arc::new(FakeExtractor {
                text: PAGE_TEXT.to_string(),
                pages,
            }),
            rasterizer: Arc::new(FakeRasterizer {
                pages,
                skip: skip_image,
            }),
            scripts: scripts.clone(),
            renderer: renderer.clone(),
            media: media.clone(),
        };
        let config = PipelineConfig::builder()
            .work_root(work_root.path())
            .output_dir(output_dir.path())
            .poll_interval(Duration::from_secs(5))
            .max_poll_duration(Duration::from_secs(600))
            .progress_callback(progress.clone() as Arc<dyn PipelineProgressCallback>)
            .build()
            .unwrap();

        Self {
            work_root,
            output_dir,
            scripts,
            renderer,
            media,
            progress,
            services,
            config,
        }
    }

    fn leftover_workspaces(&self) -> usize {
        std::fs::read_dir(self.work_root.path()).unwrap().count()
    }

    fn output_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.output_dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    fn calls(&self) -> Vec<String> {
        self.media.calls.lock().unwrap().clone()
    }
}

const PAGE_TEXT: &str = "Revenue grew.\x0cCosts fell.\x0cOutlook is strong.";
const PDF: &[u8] = b"%PDF-1.7 fake";

// ── Page-by-page ─────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn segments_follow_page_order_despite_reverse_completion() {
    let h = Harness::new(3, None, FakeRenderer::reverse_order(3), FakeScripts::default());

    let output = run_page_by_page_pipeline(PDF, PAGE_TEXT, 3, &h.config, &h.services)
        .await
        .unwrap();

    assert_eq!(
        h.calls(),
        vec![
            "normalize raw-0.mp4",
            "composite page-1.jpg raw-1.mp4",
            "composite page-2.jpg raw-2.mp4",
            "composite page-3.jpg raw-3.mp4",
            "concat 4",
        ]
    );
    let manifest = h.media.manifest.lock().unwrap().clone();
    let names: Vec<&str> = manifest
        .lines()
        .map(|l| l.rsplit('/').next().unwrap().trim_end_matches('\''))
        .collect();
    assert_eq!(
        names,
        vec![
            "normalized-0.mp4",
            "composited-1.mp4",
            "composited-2.mp4",
            "composited-3.mp4"
        ]
    );
    assert_eq!(
        *h.renderer.downloads.lock().unwrap(),
        vec![
            "https://cdn.example/intro.mp4",
            "https://cdn.example/page-1.mp4",
            "https://cdn.example/page-2.mp4",
            "https://cdn.example/page-3.mp4",
        ]
    );

    // Text was split on the page markers.
    assert_eq!(
        *h.scripts.seen_pages.lock().unwrap(),
        vec!["Revenue grew.", "Costs fell.", "Outlook is strong."]
    );

    let indices: Vec<usize> = output.segments.iter().map(|s| s.page_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(output.segments[0].kind, SegmentKind::Normalized);
    assert_eq!(output.stats.segments, 4);
    assert_eq!(output.stats.composited_segments, 3);
    assert_eq!(output.stats.page_count, 3);
    // The intro needs 4 queries, one per sweep.
    assert_eq!(output.stats.poll_sweeps, 4);
    assert_eq!(output.scripts.len(), 4);

    assert!(output.video_path.starts_with(h.output_dir.path()));
    assert!(file_name(&output.video_path).starts_with("stitched-"));
    assert!(file_name(&output.video_path).ends_with(&format!("-{}.mp4", output.run_id)));
    assert_eq!(std::fs::read(&output.video_path).unwrap(), b"final video");
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_page_render_fails_run_in_generating_videos() {
    let mut renderer = FakeRenderer::reverse_order(3);
    renderer
        .failing
        .insert("page-2".into(), "renderer overloaded".into());
    let h = Harness::new(3, None, renderer, FakeScripts::default());

    let err = run_page_by_page_pipeline(PDF, PAGE_TEXT, 3, &h.config, &h.services)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::GeneratingVideos);
    assert!(!err.is_advisory());
    match &err.source {
        Pdf2VideoError::RenderJobFailed {
            page_index,
            message,
        } => {
            assert_eq!(*page_index, 2);
            assert_eq!(message, "renderer overloaded");
        }
        other => panic!("expected RenderJobFailed, got {other:?}"),
    }
    assert!(err.user_message().contains("page 2"));

    // Nothing was stitched, nothing left on disk.
    assert!(h.calls().is_empty());
    assert!(h.output_files().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);

    let failures = h.progress.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::GeneratingVideos);
    assert_eq!(h.progress.stages().last(), Some(&Stage::Error));
}

#[tokio::test(start_paused = true)]
async fn concat_failure_fails_run_in_stitching_and_cleans_up() {
    let h = Harness::new(3, None, FakeRenderer::reverse_order(3), FakeScripts::default());
    h.media.fail_concat.store(true, Ordering::SeqCst);

    let err = run_page_by_page_pipeline(PDF, PAGE_TEXT, 3, &h.config, &h.services)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Stitching);
    assert!(matches!(err.source, Pdf2VideoError::ConcatFailed { .. }));
    assert!(!err.user_message().contains("DTS"));
    // Clips were built before the concat broke.
    assert_eq!(h.calls().len(), 5);

    assert!(h.output_files().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
    assert_eq!(h.progress.stages().last(), Some(&Stage::Error));
}

#[tokio::test(start_paused = true)]
async fn promotion_failure_fails_run_in_stitching_and_cleans_up() {
    let mut h = Harness::new(2, None, FakeRenderer::reverse_order(2), FakeScripts::default());
    // A plain file where the output directory should be.
    let blocker = h.output_dir.path().join("videos");
    std::fs::write(&blocker, b"not a directory").unwrap();
    h.config.output_dir = blocker.clone();

    let text = "Revenue grew.\x0cCosts fell.";
    let err = run_page_by_page_pipeline(PDF, text, 2, &h.config, &h.services)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Stitching);
    assert!(matches!(err.source, Pdf2VideoError::OutputWriteFailed { .. }));
    assert_eq!(h.output_files(), vec![blocker]);
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_page_image_falls_back_to_full_screen_clip() {
    let h = Harness::new(3, Some(2), FakeRenderer::reverse_order(3), FakeScripts::default());

    let output = run_page_by_page_pipeline(PDF, PAGE_TEXT, 3, &h.config, &h.services)
        .await
        .unwrap();

    assert_eq!(output.segments[2].kind, SegmentKind::Normalized);
    assert_eq!(
        output.segments[2].notice,
        Some(SegmentNotice::MissingPageImage { page_index: 2 })
    );
    assert_eq!(output.stats.composited_segments, 2);
    assert!(h.calls().contains(&"normalize raw-2.mp4".to_string()));
    assert_eq!(
        *h.progress.notices.lock().unwrap(),
        vec![SegmentNotice::MissingPageImage { page_index: 2 }]
    );
    assert!(output.video_path.exists());
}

#[tokio::test(start_paused = true)]
async fn stalled_render_times_out_with_hosted_links() {
    let mut renderer = FakeRenderer::reverse_order(2);
    renderer.never_ready.push("page-1".into());
    let mut h = Harness::new(2, None, renderer, FakeScripts::default());
    h.config.max_poll_sweeps = Some(3);

    let err = run_page_by_page_pipeline(PDF, "One.\x0cTwo.", 2, &h.config, &h.services)
        .await
        .unwrap_err();

    assert!(err.is_advisory());
    assert_eq!(err.stage, Stage::GeneratingVideos);
    match &err.source {
        Pdf2VideoError::RenderTimeout { pending, .. } => {
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].page_index, 1);
            assert_eq!(
                pending[0].hosted_url.as_deref(),
                Some("https://render.example/v/page-1")
            );
        }
        other => panic!("expected RenderTimeout, got {other:?}"),
    }
    assert!(h.output_files().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn script_failure_stops_before_any_submission() {
    let scripts = FakeScripts {
        fail: true,
        ..Default::default()
    };
    let h = Harness::new(3, None, FakeRenderer::reverse_order(3), scripts);

    let err = run_page_by_page_pipeline(PDF, PAGE_TEXT, 3, &h.config, &h.services)
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::GeneratingScripts);
    assert!(h.renderer.submitted.lock().unwrap().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn progress_walks_every_stage_in_order() {
    let h = Harness::new(3, None, FakeRenderer::reverse_order(3), FakeScripts::default());

    let output = run_page_by_page_pipeline(PDF, PAGE_TEXT, 3, &h.config, &h.services)
        .await
        .unwrap();

    assert_eq!(
        h.progress.stages(),
        vec![
            Stage::RasterizingPages,
            Stage::GeneratingScripts,
            Stage::GeneratingVideos,
            Stage::Stitching,
            Stage::Done,
        ]
    );
    let events = h.progress.events.lock().unwrap().clone();
    assert!(events.iter().all(|e| e.run_id == output.run_id));

    // Ready counts during rendering never go backwards and end at 4/4.
    let rendering: Vec<(usize, usize)> = events
        .iter()
        .filter(|e| e.stage == Stage::GeneratingVideos)
        .map(|e| (e.ready, e.total))
        .collect();
    assert!(rendering.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(rendering.last(), Some(&(4, 4)));
    assert_eq!(events.last().map(|e| (e.ready, e.total)), Some((4, 4)));
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn summary_produces_one_full_screen_clip() {
    let h = Harness::new(3, None, FakeRenderer::default(), FakeScripts::default());
    let mut config = h.config.clone();
    config.tone = Tone::Casual;
    config.target_duration_secs = 60;

    let output = run_summary_pipeline(PAGE_TEXT, &config, &h.services)
        .await
        .unwrap();

    let submitted = h.renderer.submitted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, "intro");
    assert!(submitted[0].1.contains("casual 60s summary"));

    assert_eq!(h.calls(), vec!["normalize raw-0.mp4", "concat 1"]);
    assert_eq!(output.segments.len(), 1);
    assert_eq!(output.segments[0].kind, SegmentKind::Normalized);
    assert_eq!(output.segments[0].notice, None);
    assert_eq!(
        h.progress.stages(),
        vec![
            Stage::GeneratingScripts,
            Stage::GeneratingVideos,
            Stage::Stitching,
            Stage::Done,
        ]
    );
    assert_eq!(h.output_files(), vec![output.video_path.clone()]);
    assert_eq!(h.leftover_workspaces(), 0);
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn convert_with_reads_the_file_and_dispatches_by_mode() {
    let h = Harness::new(3, None, FakeRenderer::reverse_order(3), FakeScripts::default());
    let doc = h.work_root.path().join("deck.pdf");
    std::fs::write(&doc, PDF).unwrap();
    let doc = doc.to_string_lossy().into_owned();

    let output = convert_with(&doc, ConversionMode::PageByPage, &h.config, &h.services)
        .await
        .unwrap();
    assert_eq!(output.segments.len(), 4);

    std::fs::remove_file(&doc).unwrap();
    assert_eq!(h.leftover_workspaces(), 0);
}

#[tokio::test(start_paused = true)]
async fn convert_with_rejects_non_pdf_in_first_stage() {
    let h = Harness::new(1, None, FakeRenderer::default(), FakeScripts::default());
    let doc = h.output_dir.path().join("notes.txt");
    std::fs::write(&doc, b"plain text").unwrap();

    let err = convert_with(
        doc.to_string_lossy(),
        ConversionMode::Summary,
        &h.config,
        &h.services,
    )
    .await
    .unwrap_err();

    assert_eq!(err.stage, Stage::GeneratingScripts);
    assert!(matches!(
        err.source,
        Pdf2VideoError::UnsupportedDocument { .. }
    ));
    assert!(h.renderer.submitted.lock().unwrap().is_empty());
    assert_eq!(h.leftover_workspaces(), 0);
}
