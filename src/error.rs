//! Error types for the edgequake-pdf2video library.
//!
//! Three types reflect three distinct failure modes:
//!
//! * [`Pdf2VideoError`]: **Fatal** cause: a collaborator, a remote job or
//!   the media tool failed and the run cannot produce a video.
//!
//! * [`PipelineError`]: the single terminal error of a run. Wraps the
//!   fatal cause together with the [`Stage`] that was active when it
//!   happened, which is what callers show to users.
//!
//! * [`SegmentNotice`]: **Non-fatal**: one segment was assembled in a
//!   degraded way (page image missing, so the clip was normalised instead of
//!   composited). Stored on [`crate::output::SegmentResult`]; never an `Err`.

use crate::run::Stage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A render job that was still in flight when the poll ceiling was hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingJob {
    pub page_index: usize,
    pub remote_job_id: String,
    /// Link the render service hosts for the job, when it reported one.
    pub hosted_url: Option<String>,
}

/// All fatal errors produced by the edgequake-pdf2video library.
#[derive(Debug, Error)]
pub enum Pdf2VideoError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The input string is not a valid file path or URL, or is too large.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The document bytes could not be parsed.
    #[error("Unsupported document: {detail}")]
    UnsupportedDocument { detail: String },

    /// The document parsed but yielded zero pages.
    #[error("Document has no pages")]
    EmptyDocument,

    /// The document has pages but no extractable text (image-only scan).
    #[error("This document appears to be a scanned image; upload a text-based PDF")]
    ScannedDocumentNoText,

    // ── Script generation ─────────────────────────────────────────────────
    /// The script-generation service failed after retries.
    #[error("Script generation failed: {message}")]
    ScriptGenerationFailed { message: String },

    /// The configured LLM provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Render service ────────────────────────────────────────────────────
    /// Submitting a job to the render service failed.
    #[error("Render submission failed for '{label}': {message}")]
    SubmitFailed { label: String, message: String },

    /// A render job reported `Failed`. One failed page fails the batch.
    #[error("Render job for page {page_index} failed: {message}")]
    RenderJobFailed { page_index: usize, message: String },

    /// Jobs were still rendering when the poll ceiling was reached.
    ///
    /// Advisory: the remote jobs keep going, `pending` carries their links.
    #[error("Rendering still in progress after {elapsed_secs}s ({} job(s) pending); check back later", .pending.len())]
    RenderTimeout {
        elapsed_secs: u64,
        pending: Vec<PendingJob>,
    },

    /// A `Ready` job carried no download URL.
    #[error("Render job for page {page_index} is ready but has no download URL")]
    MissingDownloadUrl { page_index: usize },

    // ── Media tool ────────────────────────────────────────────────────────
    /// Normalising a clip to the canonical profile failed.
    #[error("Encoding failed{}: {stderr}", describe_exit(.exit_code, .timed_out))]
    EncodeFailed {
        exit_code: Option<i32>,
        timed_out: bool,
        stderr: String,
    },

    /// Picture-in-picture compositing failed.
    #[error("Compositing failed{}: {stderr}", describe_exit(.exit_code, .timed_out))]
    CompositeFailed {
        exit_code: Option<i32>,
        timed_out: bool,
        stderr: String,
    },

    /// Final concatenation failed.
    #[error("Concatenation failed{}: {stderr}", describe_exit(.exit_code, .timed_out))]
    ConcatFailed {
        exit_code: Option<i32>,
        timed_out: bool,
        stderr: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Creating or writing inside the run workspace failed.
    #[error("Workspace I/O failed at '{path}': {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not move the final video to its output location.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe_exit(exit_code: &Option<i32>, timed_out: &bool) -> String {
    match (*timed_out, *exit_code) {
        (true, _) => " (timed out)".to_string(),
        (false, Some(code)) => format!(" (exit code {code})"),
        (false, None) => " (terminated by signal)".to_string(),
    }
}

impl Pdf2VideoError {
    /// `true` for outcomes that mean "not finished yet" rather than "broken".
    pub fn is_advisory(&self) -> bool {
        matches!(self, Pdf2VideoError::RenderTimeout { .. })
    }

    /// Shorthand for wrapping an I/O error on a workspace path.
    pub(crate) fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Pdf2VideoError::Workspace {
            path: path.into(),
            source,
        }
    }

    /// Message safe to show an end user: no local paths, no tool dumps.
    pub fn user_message(&self) -> String {
        match self {
            Pdf2VideoError::RenderJobFailed {
                page_index,
                message,
            } => {
                if *page_index == 0 {
                    format!("The intro video failed to render: {message}")
                } else {
                    format!("The video for page {page_index} failed to render: {message}")
                }
            }
            Pdf2VideoError::RenderTimeout { .. } => {
                "Your videos are still being generated. Check back later.".to_string()
            }
            Pdf2VideoError::EncodeFailed { .. } => "Failed to encode a video clip".to_string(),
            Pdf2VideoError::CompositeFailed { .. } => {
                "Failed to place the presenter over a page".to_string()
            }
            Pdf2VideoError::ConcatFailed { .. } => "Failed to stitch the final video".to_string(),
            Pdf2VideoError::Workspace { .. } | Pdf2VideoError::OutputWriteFailed { .. } => {
                "Failed to write video files".to_string()
            }
            Pdf2VideoError::FileNotFound { .. } => "The document could not be found".to_string(),
            Pdf2VideoError::InvalidInput { .. } => {
                "The input is not a readable PDF file or URL".to_string()
            }
            Pdf2VideoError::DownloadFailed { .. } => "A download failed".to_string(),
            Pdf2VideoError::DownloadTimeout { secs, .. } => {
                format!("A download timed out after {secs}s")
            }
            Pdf2VideoError::UnsupportedDocument { .. } => {
                "The file is not a PDF this tool can read".to_string()
            }
            Pdf2VideoError::EmptyDocument => "The document has no pages".to_string(),
            Pdf2VideoError::ScannedDocumentNoText => {
                "This document appears to be a scanned image; upload a text-based PDF".to_string()
            }
            Pdf2VideoError::ScriptGenerationFailed { .. } => {
                "The narration script could not be generated".to_string()
            }
            Pdf2VideoError::ProviderNotConfigured { provider, .. } => {
                format!("The LLM provider '{provider}' is not configured")
            }
            Pdf2VideoError::SubmitFailed { label, .. } => {
                format!("The render service rejected the {} video", label.to_lowercase())
            }
            Pdf2VideoError::MissingDownloadUrl { page_index } => {
                format!("The video for segment {page_index} has no download link")
            }
            Pdf2VideoError::InvalidConfig(reason) => format!("Invalid configuration: {reason}"),
            Pdf2VideoError::PdfiumBindingFailed(_) => {
                "The PDF engine (pdfium) is not available".to_string()
            }
            Pdf2VideoError::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

/// The terminal error of one pipeline run: which stage failed, and why.
#[derive(Debug, Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: Pdf2VideoError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: Pdf2VideoError) -> Self {
        Self { stage, source }
    }

    /// Stage label plus a path-free description of the cause.
    pub fn user_message(&self) -> String {
        format!("{}: {}", self.stage, self.source.user_message())
    }

    pub fn is_advisory(&self) -> bool {
        self.source.is_advisory()
    }
}

/// A non-fatal degradation recorded against a single output segment.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum SegmentNotice {
    /// The page image was absent at stitch time; the clip was normalised
    /// full-screen instead of composited.
    #[error("Page {page_index}: page image missing, using the presenter clip alone")]
    MissingPageImage { page_index: usize },
}
