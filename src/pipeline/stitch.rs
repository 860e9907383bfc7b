//! Stitching: turn completed render jobs into one video file.
//!
//! Segments are processed strictly in ascending page index, one ffmpeg call
//! at a time:
//!
//! * index 0 (intro)          → normalise full-screen
//! * index ≥ 1, image on disk → composite the clip over the page image
//! * index ≥ 1, image missing → normalise, and record
//!   [`SegmentNotice::MissingPageImage`]
//!
//! The resulting clips all share the canonical profile, so the final step
//! is a stream-copy concatenation driven by a manifest.

use crate::error::{Pdf2VideoError, SegmentNotice};
use crate::output::{
    ordered_jobs, JobMap, MediaRole, Page, SegmentKind, SegmentResult, INTRO_INDEX,
};
use crate::pipeline::media::{concat_manifest, MediaTool};
use crate::pipeline::renderer::RenderService;
use crate::pipeline::workspace::Workspace;
use crate::progress::ProgressCallback;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// What the stitching stage produced, still inside the workspace.
#[derive(Debug, Clone)]
pub struct StitchOutcome {
    pub artifact: PathBuf,
    pub segments: Vec<SegmentResult>,
}

/// Download, prepare and join every clip in `jobs`.
pub async fn stitch(
    renderer: &dyn RenderService,
    media: &dyn MediaTool,
    workspace: &Workspace,
    jobs: &JobMap,
    pages: &[Page],
    progress: Option<&ProgressCallback>,
) -> Result<StitchOutcome, Pdf2VideoError> {
    let ordered = ordered_jobs(jobs);
    if ordered.is_empty() {
        return Err(Pdf2VideoError::Internal("no render jobs to stitch".into()));
    }
    let mut urls = Vec::with_capacity(ordered.len());
    for job in &ordered {
        match job.download_url.as_deref() {
            Some(url) => urls.push((job.page_index, url)),
            None => {
                return Err(Pdf2VideoError::MissingDownloadUrl {
                    page_index: job.page_index,
                })
            }
        }
    }

    let mut clips = Vec::with_capacity(urls.len());
    let mut segments = Vec::with_capacity(urls.len());

    for (page_index, url) in urls {
        let started = Instant::now();
        let raw = workspace.asset(MediaRole::RawDownload, page_index);
        renderer.download(url, &raw.path).await?;

        let background = page_image(pages, page_index).await;
        let (kind, notice, out) = match background {
            Some(image) => {
                let out = workspace.asset(MediaRole::Composited, page_index);
                media.composite(&image, &raw.path, &out.path).await?;
                (SegmentKind::Composited, None, out)
            }
            None => {
                let notice = (page_index != INTRO_INDEX)
                    .then_some(SegmentNotice::MissingPageImage { page_index });
                if let Some(ref n) = notice {
                    warn!(page = page_index, "{}", n);
                    if let Some(cb) = progress {
                        cb.on_segment_notice(n);
                    }
                }
                let out = workspace.asset(MediaRole::Normalized, page_index);
                media.normalize(&raw.path, &out.path).await?;
                (SegmentKind::Normalized, notice, out)
            }
        };

        if let Err(e) = tokio::fs::remove_file(&raw.path).await {
            warn!("Could not remove {}: {}", raw.path.display(), e);
        }

        info!(page = page_index, kind = ?kind, "Segment ready");
        clips.push(out.path);
        segments.push(SegmentResult {
            page_index,
            kind,
            notice,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }

    let manifest = workspace.manifest_path();
    tokio::fs::write(&manifest, concat_manifest(&clips))
        .await
        .map_err(|e| Pdf2VideoError::workspace(&manifest, e))?;

    let artifact = workspace.asset(MediaRole::Final, 0).path;
    media.concat(&manifest, &artifact).await?;
    info!("Concatenated {} segments", clips.len());

    Ok(StitchOutcome { artifact, segments })
}

/// The page image for `page_index`, if it is known and present on disk.
async fn page_image(pages: &[Page], page_index: usize) -> Option<PathBuf> {
    let page = pages.iter().find(|p| p.index == page_index)?;
    if page.is_intro() {
        return None;
    }
    let path = page.image_path.clone()?;
    exists(&path).await.then_some(path)
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
