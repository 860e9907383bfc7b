//! Data model shared by the pipeline stages, and the result a run returns.

use crate::error::SegmentNotice;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Page index reserved for the document-level intro segment.
pub const INTRO_INDEX: usize = 0;

/// One segment of the output video.
///
/// Index 0 is the intro, which has no page image. Indices `1..=N` map 1:1 to
/// rasterised document pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub index: usize,
    pub image_path: Option<PathBuf>,
}

impl Page {
    pub fn intro() -> Self {
        Self {
            index: INTRO_INDEX,
            image_path: None,
        }
    }

    pub fn is_intro(&self) -> bool {
        self.index == INTRO_INDEX
    }
}

/// Remote render state as reported by the render service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    Queued,
    Generating,
    Ready,
    Failed,
}

impl RenderStatus {
    /// `Ready` and `Failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderStatus::Ready | RenderStatus::Failed)
    }
}

/// A status query answer from the render service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJobUpdate {
    pub status: RenderStatus,
    pub hosted_url: Option<String>,
    pub download_url: Option<String>,
    pub error_message: Option<String>,
}

/// One remote rendering job per page (intro included).
///
/// `download_url` is `Some` exactly when `status == Ready`; [`RenderJob::apply`]
/// maintains that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJob {
    pub page_index: usize,
    pub remote_job_id: String,
    pub status: RenderStatus,
    pub hosted_url: Option<String>,
    pub download_url: Option<String>,
    pub error_message: Option<String>,
}

impl RenderJob {
    pub fn queued(page_index: usize, remote_job_id: impl Into<String>) -> Self {
        Self {
            page_index,
            remote_job_id: remote_job_id.into(),
            status: RenderStatus::Queued,
            hosted_url: None,
            download_url: None,
            error_message: None,
        }
    }

    /// Fold a status answer into this job.
    ///
    /// A `Ready` answer without a download URL leaves the job `Generating`
    /// so the next sweep asks again.
    pub fn apply(&mut self, update: RenderJobUpdate) {
        if update.hosted_url.is_some() {
            self.hosted_url = update.hosted_url;
        }
        (self.status, self.download_url) = match (update.status, update.download_url) {
            (RenderStatus::Ready, Some(url)) => (RenderStatus::Ready, Some(url)),
            (RenderStatus::Ready, None) => (RenderStatus::Generating, None),
            (status, _) => (status, None),
        };
        self.error_message = update.error_message;
    }
}

/// Render jobs keyed by page index. Order is imposed at consumption time.
pub type JobMap = HashMap<usize, RenderJob>;

/// Jobs sorted by ascending page index.
pub fn ordered_jobs(jobs: &JobMap) -> Vec<&RenderJob> {
    let mut v: Vec<&RenderJob> = jobs.values().collect();
    v.sort_by_key(|j| j.page_index);
    v
}

/// What a file in the run workspace is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaRole {
    RawDownload,
    Normalized,
    Composited,
    Final,
}

/// An on-disk media file owned by one run's workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub path: PathBuf,
    pub role: MediaRole,
}

/// Narration for one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageScript {
    pub page_index: usize,
    pub script: String,
}

impl PageScript {
    /// Job label sent to the render service.
    pub fn label(&self) -> String {
        segment_label(self.page_index)
    }
}

/// `Intro` for index 0, `Page N` otherwise.
pub fn segment_label(page_index: usize) -> String {
    if page_index == INTRO_INDEX {
        "Intro".to_string()
    } else {
        format!("Page {page_index}")
    }
}

/// A single summary narration script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub text: String,
    pub word_count: usize,
    pub estimated_duration_secs: u64,
}

/// How one segment of the final video was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    /// Full-screen presenter clip re-encoded to the canonical profile.
    Normalized,
    /// Presenter clip overlaid on the page image.
    Composited,
}

/// Per-segment outcome of the stitching stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentResult {
    pub page_index: usize,
    pub kind: SegmentKind,
    pub notice: Option<SegmentNotice>,
    pub duration_ms: u64,
}

/// Timing and counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub page_count: usize,
    pub segments: usize,
    pub composited_segments: usize,
    pub poll_sweeps: u32,
    pub rasterize_duration_ms: u64,
    pub script_duration_ms: u64,
    pub render_duration_ms: u64,
    pub stitch_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub run_id: String,
    /// The promoted final video. The only file of the run left on disk.
    pub video_path: PathBuf,
    /// Narration that was rendered, by ascending page index.
    pub scripts: Vec<PageScript>,
    /// Segments in output order.
    pub segments: Vec<SegmentResult>,
    pub stats: RunStats,
}

/// What [`crate::convert::inspect`] reports about a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    pub character_count: usize,
}
