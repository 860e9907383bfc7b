//! Job submission and status polling against the render service.
//!
//! ## Submission
//!
//! Scripts are submitted with bounded concurrency
//! (`buffer_unordered(submit_concurrency)`). Completion order is irrelevant:
//! every result carries its own page index and lands in the [`JobMap`]
//! under that key.
//!
//! ## Polling
//!
//! An explicit loop. Each sweep queries every job that is not yet terminal,
//! folds the answers in, then:
//!
//! * any job `Failed`  → abort with [`Pdf2VideoError::RenderJobFailed`]
//! * all jobs `Ready`  → return
//! * ceiling reached   → advisory [`Pdf2VideoError::RenderTimeout`]
//! * otherwise         → sleep `poll_interval` and sweep again
//!
//! A status query that errors (network, HTTP 5xx) leaves that job as it was
//! for this sweep. Only a job-reported `Failed` aborts the batch.

use crate::config::PipelineConfig;
use crate::error::{PendingJob, Pdf2VideoError};
use crate::output::{ordered_jobs, JobMap, PageScript, RenderJob, RenderJobUpdate, RenderStatus};
use crate::pipeline::renderer::RenderService;
use crate::run::PipelineRun;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Submit every script and return the resulting job map.
///
/// The first submission error aborts the rest; jobs already accepted by the
/// service are left to finish on their own.
pub async fn submit_all(
    renderer: &dyn RenderService,
    scripts: &[PageScript],
    concurrency: usize,
) -> Result<JobMap, Pdf2VideoError> {
    let submitted: Vec<RenderJob> = stream::iter(scripts.iter().map(|s| async move {
        let label = s.label();
        let id = renderer.submit(&s.script, &label).await?;
        info!(page = s.page_index, job = %id, "Submitted render job '{}'", label);
        Ok::<_, Pdf2VideoError>(RenderJob::queued(s.page_index, id))
    }))
    .buffer_unordered(concurrency.max(1))
    .try_collect()
    .await?;

    let mut jobs = JobMap::with_capacity(submitted.len());
    for job in submitted {
        let idx = job.page_index;
        if jobs.insert(idx, job).is_some() {
            return Err(Pdf2VideoError::Internal(format!(
                "two scripts submitted for page index {idx}"
            )));
        }
    }
    Ok(jobs)
}

/// When polling gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_duration: Duration,
    pub max_sweeps: Option<u32>,
    /// Concurrent status queries within one sweep.
    pub concurrency: usize,
}

impl PollSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            interval: config.poll_interval,
            max_duration: config.max_poll_duration,
            max_sweeps: config.max_poll_sweeps,
            concurrency: config.submit_concurrency,
        }
    }

    fn exhausted(&self, sweeps: u32, elapsed: Duration) -> bool {
        elapsed >= self.max_duration || self.max_sweeps.is_some_and(|max| sweeps >= max)
    }
}

/// Poll `run.jobs` until all are `Ready`. Returns the number of sweeps.
///
/// Every sweep is reported through [`PipelineRun::report_sweep`].
pub async fn poll_until_complete(
    renderer: &dyn RenderService,
    run: &mut PipelineRun,
    settings: PollSettings,
) -> Result<u32, Pdf2VideoError> {
    let started = Instant::now();
    let total = run.jobs.len();
    let mut sweeps = 0u32;

    loop {
        sweeps += 1;

        let pending: Vec<(usize, String)> = ordered_jobs(&run.jobs)
            .into_iter()
            .filter(|j| !j.status.is_terminal())
            .map(|j| (j.page_index, j.remote_job_id.clone()))
            .collect();

        let mut answers: Vec<(usize, Option<RenderJobUpdate>)> =
            stream::iter(pending.into_iter().map(|(idx, id)| async move {
                match renderer.status(&id).await {
                    Ok(update) => (idx, Some(update)),
                    Err(e) => {
                        warn!(page = idx, job = %id, "Status query failed, retrying next sweep: {}", e);
                        (idx, None)
                    }
                }
            }))
            .buffer_unordered(settings.concurrency.max(1))
            .collect()
            .await;
        answers.sort_by_key(|(idx, _)| *idx);

        for (idx, update) in answers {
            let Some(update) = update else { continue };
            let Some(job) = run.jobs.get_mut(&idx) else {
                continue;
            };
            job.apply(update);
            if job.status == RenderStatus::Failed {
                let message = job
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "render service reported an error".to_string());
                return Err(Pdf2VideoError::RenderJobFailed {
                    page_index: idx,
                    message,
                });
            }
        }

        let ready = run
            .jobs
            .values()
            .filter(|j| j.status == RenderStatus::Ready)
            .count();
        debug!(sweep = sweeps, ready, total, "Poll sweep finished");
        run.report_sweep(ready, total);

        if ready == total {
            info!("All {} render jobs ready after {} sweep(s)", total, sweeps);
            return Ok(sweeps);
        }

        let elapsed = started.elapsed();
        if settings.exhausted(sweeps, elapsed) {
            let pending = ordered_jobs(&run.jobs)
                .into_iter()
                .filter(|j| !j.status.is_terminal())
                .map(|j| PendingJob {
                    page_index: j.page_index,
                    remote_job_id: j.remote_job_id.clone(),
                    hosted_url: j.hosted_url.clone(),
                })
                .collect();
            return Err(Pdf2VideoError::RenderTimeout {
                elapsed_secs: elapsed.as_secs(),
                pending,
            });
        }

        tokio::time::sleep(settings.interval).await;
    }
}
