//! Pipeline stages for document-to-video conversion.
//!
//! Each submodule implements one transformation step or one external
//! collaborator. Collaborators sit behind traits so the orchestrator in
//! [`crate::convert`] can be driven by fakes in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ rasterize ──▶ split ──▶ script ──▶ poll ──▶ stitch
//! (URL/path) (pdfium)    (pdfium)    (pages)    (LLM)    (render)  (ffmpeg)
//! ```
//!
//! 1. [`input`]    : canonicalise the user-supplied path or URL to bytes
//! 2. [`extract`]  : full text and page count; runs in `spawn_blocking`
//! 3. [`rasterize`]: one JPEG per page; runs in `spawn_blocking`
//! 4. [`split`]    : break the full text into per-page segments
//! 5. [`script`]   : narration per page plus an intro, with retry/backoff
//! 6. [`poll`]     : submit render jobs and poll them to a terminal state
//! 7. [`stitch`]   : composite or normalise every clip, then concatenate
//!
//! [`renderer`], [`media`] and [`workspace`] are the boundaries to the render
//! service, the ffmpeg binary and the filesystem.

pub mod extract;
pub mod input;
pub mod media;
pub mod poll;
pub mod postprocess;
pub mod rasterize;
pub mod renderer;
pub mod script;
pub mod split;
pub mod stitch;
pub mod workspace;

use crate::config::PipelineConfig;
use crate::error::Pdf2VideoError;
use std::sync::Arc;

pub use extract::{ExtractedText, PdfiumTextExtractor, TextExtractor};
pub use media::{FfmpegTool, MediaTool};
pub use rasterize::{PageRasterizer, PdfiumRasterizer, RasterizedPages};
pub use renderer::{HttpRenderService, RenderService};
pub use script::{LlmScriptGenerator, ScriptGenerator};

/// The collaborators one run talks to.
///
/// [`PipelineServices::from_config`] wires the production implementations;
/// the `with_*` methods swap any of them out.
#[derive(Clone)]
pub struct PipelineServices {
    pub extractor: Arc<dyn TextExtractor>,
    pub rasterizer: Arc<dyn PageRasterizer>,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub renderer: Arc<dyn RenderService>,
    pub media: Arc<dyn MediaTool>,
}

impl PipelineServices {
    /// Production collaborators: pdfium, the configured LLM, the HTTP
    /// render service and ffmpeg.
    pub fn from_config(config: &PipelineConfig) -> Result<Self, Pdf2VideoError> {
        Ok(Self {
            extractor: Arc::new(PdfiumTextExtractor),
            rasterizer: Arc::new(PdfiumRasterizer::from_config(config)),
            scripts: Arc::new(LlmScriptGenerator::from_config(config)?),
            renderer: Arc::new(HttpRenderService::new(
                config.render_service.clone(),
                config.download_timeout_secs,
            )?),
            media: Arc::new(FfmpegTool::from_config(config)),
        })
    }
}
