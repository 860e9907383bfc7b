//! Progress-callback trait for pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgressCallback>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive an
//! event on every stage transition and on every poll sweep.
//!
//! # Callbacks or channels?
//!
//! Both. The trait is the integration point the pipeline calls into; the
//! [`ProgressBroadcaster`] implementation fans those events out to any number
//! of subscribers over a `tokio::sync::broadcast` channel, so a web handler
//! can hand each connected client its own stream without the pipeline knowing
//! who is listening.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2video::{PipelineProgressCallback, ProgressEvent, PipelineConfig};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl PipelineProgressCallback for Printer {
//!     fn on_progress(&self, event: ProgressEvent) {
//!         eprintln!("{}: {}/{}", event.stage, event.ready, event.total);
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn PipelineProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::SegmentNotice;
use crate::run::Stage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// One progress notification: where the run is and how many clips are ready.
///
/// `ready`/`total` are meaningful from `GeneratingVideos` onwards and are
/// carried forward unchanged through later stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: String,
    pub stage: Stage,
    pub ready: usize,
    pub total: usize,
}

/// Called by the pipeline as a run makes progress.
///
/// Implementations must be `Send + Sync`; runs execute on the tokio
/// runtime and several runs may share one callback. All methods have no-op
/// defaults so callers only override what they care about.
pub trait PipelineProgressCallback: Send + Sync {
    /// Called on every stage transition and on every poll sweep.
    fn on_progress(&self, event: ProgressEvent) {
        let _ = event;
    }

    /// Called when a segment is assembled in a degraded way.
    fn on_segment_notice(&self, notice: &SegmentNotice) {
        let _ = notice;
    }

    /// Called once when a run ends in `Error`.
    ///
    /// # Arguments
    /// * `stage`  : the stage that was active when the failure happened
    /// * `message`: path-free description suitable for end users
    fn on_run_failed(&self, stage: Stage, message: &str) {
        let _ = (stage, message);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type ProgressCallback = Arc<dyn PipelineProgressCallback>;

/// Fans progress events out to any number of subscribers.
///
/// Slow subscribers that fall more than `capacity` events behind miss the
/// oldest events (they observe a `Lagged` item on the stream); the pipeline
/// itself never blocks on a subscriber.
#[derive(Clone)]
pub struct ProgressBroadcaster {
    tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe with a raw broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream` of events.
    pub fn subscribe_stream(&self) -> BroadcastStream<ProgressEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PipelineProgressCallback for ProgressBroadcaster {
    fn on_progress(&self, event: ProgressEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}
