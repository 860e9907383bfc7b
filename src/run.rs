//! Pipeline run state: the stage machine every run walks through.
//!
//! ```text
//! RasterizingPages → GeneratingScripts → GeneratingVideos → Stitching → Done
//!        │                  │                   │               │
//!        └──────────────────┴─────────┬─────────┴───────────────┘
//!                                     ▼
//!                                   Error
//! ```
//!
//! Transitions only move forward. A failure anywhere moves the run straight
//! to `Error`; there is no retry-in-place. Callers that want another attempt
//! start a brand-new run with a fresh workspace.

use crate::error::{PipelineError, Pdf2VideoError};
use crate::output::{JobMap, Page};
use crate::progress::{ProgressCallback, ProgressEvent};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Stages of a pipeline run, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    RasterizingPages,
    GeneratingScripts,
    GeneratingVideos,
    Stitching,
    Done,
    Error,
}

impl Stage {
    /// `Done` and `Error` end a run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Error)
    }

    /// Short human label, as shown in progress output.
    pub fn label(self) -> &'static str {
        match self {
            Stage::RasterizingPages => "Converting pages",
            Stage::GeneratingScripts => "Generating scripts",
            Stage::GeneratingVideos => "Generating videos",
            Stage::Stitching => "Stitching video",
            Stage::Done => "Done",
            Stage::Error => "Error",
        }
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_advance_to(self, next: Stage) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == Stage::Error || next > self
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mutable state of a single run.
///
/// Owned by exactly one orchestrator task; nothing else reads or writes it.
pub struct PipelineRun {
    pub run_id: String,
    stage: Stage,
    pub pages: Vec<Page>,
    pub jobs: JobMap,
    pub work_dir: PathBuf,
    pub output_path: Option<PathBuf>,
    error: Option<(Stage, String)>,
    progress: Option<ProgressCallback>,
    /// `(ready, total)` as of the most recent poll sweep.
    counts: (usize, usize),
}

impl PipelineRun {
    pub fn new(
        run_id: impl Into<String>,
        first_stage: Stage,
        work_dir: PathBuf,
        progress: Option<ProgressCallback>,
    ) -> Self {
        let run = Self {
            run_id: run_id.into(),
            stage: first_stage,
            pages: Vec::new(),
            jobs: JobMap::new(),
            work_dir,
            output_path: None,
            error: None,
            progress,
            counts: (0, 0),
        };
        info!(run_id = %run.run_id, stage = %first_stage, "Pipeline run started");
        run.emit();
        run
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stage that was active when the run failed, if it failed.
    pub fn failed_stage(&self) -> Option<Stage> {
        self.error.as_ref().map(|(stage, _)| *stage)
    }

    /// Move to the next stage and notify subscribers.
    ///
    /// Illegal transitions (backwards, or out of a terminal stage) are
    /// refused with [`Pdf2VideoError::Internal`].
    pub fn advance(&mut self, next: Stage) -> Result<(), Pdf2VideoError> {
        if next == Stage::Error || !self.stage.can_advance_to(next) {
            return Err(Pdf2VideoError::Internal(format!(
                "illegal stage transition {:?} → {:?}",
                self.stage, next
            )));
        }
        info!(run_id = %self.run_id, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        self.emit();
        Ok(())
    }

    /// Record a poll sweep's ready/total counts and notify subscribers.
    pub fn report_sweep(&mut self, ready: usize, total: usize) {
        self.counts = (ready, total);
        self.emit();
    }

    /// Move the run to `Error`, keeping the stage that failed.
    pub fn fail(&mut self, source: Pdf2VideoError) -> PipelineError {
        let failed_in = self.stage;
        if self.stage.is_terminal() {
            warn!(run_id = %self.run_id, "fail() called on a finished run");
        }
        warn!(run_id = %self.run_id, stage = %failed_in, error = %source, "Pipeline run failed");
        self.error = Some((failed_in, source.to_string()));
        self.stage = Stage::Error;
        if let Some(ref cb) = self.progress {
            cb.on_run_failed(failed_in, &source.user_message());
        }
        self.emit();
        PipelineError::new(failed_in, source)
    }

    fn emit(&self) {
        if let Some(ref cb) = self.progress {
            cb.on_progress(ProgressEvent {
                run_id: self.run_id.clone(),
                stage: self.stage,
                ready: self.counts.0,
                total: self.counts.1,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder(Mutex<Vec<ProgressEvent>>);

    impl crate::progress::PipelineProgressCallback for Recorder {
        fn on_progress(&self, event: ProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn stages_only_move_forward() {
        assert!(Stage::RasterizingPages.can_advance_to(Stage::GeneratingScripts));
        assert!(Stage::GeneratingVideos.can_advance_to(Stage::Error));
        assert!(!Stage::Stitching.can_advance_to(Stage::GeneratingVideos));
        assert!(!Stage::Done.can_advance_to(Stage::Error));
        assert!(!Stage::Error.can_advance_to(Stage::Done));
    }

    #[test]
    fn advance_refuses_backwards() {
        let mut run = PipelineRun::new("r", Stage::Stitching, PathBuf::from("/tmp/x"), None);
        assert!(run.advance(Stage::GeneratingScripts).is_err());
        assert!(run.advance(Stage::Done).is_ok());
        assert!(run.advance(Stage::Done).is_err());
    }

    #[test]
    fn fail_keeps_triggering_stage() {
        let mut run = PipelineRun::new("r", Stage::GeneratingVideos, PathBuf::from("/tmp/x"), None);
        let err = run.fail(Pdf2VideoError::RenderJobFailed {
            page_index: 2,
            message: "renderer overloaded".into(),
        });
        assert_eq!(err.stage, Stage::GeneratingVideos);
        assert_eq!(run.stage(), Stage::Error);
        assert_eq!(run.failed_stage(), Some(Stage::GeneratingVideos));
    }

    #[test]
    fn every_transition_and_sweep_is_emitted() {
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        let mut run = PipelineRun::new(
            "r",
            Stage::RasterizingPages,
            PathBuf::from("/tmp/x"),
            Some(recorder.clone() as ProgressCallback),
        );
        run.advance(Stage::GeneratingScripts).unwrap();
        run.advance(Stage::GeneratingVideos).unwrap();
        run.report_sweep(1, 4);
        run.report_sweep(4, 4);

        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0].stage, Stage::RasterizingPages);
        assert_eq!(events[4].stage, Stage::GeneratingVideos);
        assert_eq!((events[3].ready, events[3].total), (1, 4));
        assert_eq!((events[4].ready, events[4].total), (4, 4));
    }
}
