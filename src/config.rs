//! Configuration types for document-to-video runs.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Every knob lives in one struct so configs
//! can be shared across concurrent runs and logged as a unit.

use crate::error::Pdf2VideoError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Canonical encode profile every clip is brought to before concatenation.
///
/// All segments share these parameters so the final join can stream-copy
/// instead of re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_sample_rate: u32,
    pub audio_channels: u8,
}

impl Default for MediaProfile {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            video_codec: "libx264".to_string(),
            preset: "fast".to_string(),
            crf: 23,
            audio_codec: "aac".to_string(),
            audio_sample_rate: 44_100,
            audio_channels: 2,
        }
    }
}

/// Placement of the presenter clip over a page image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipLayout {
    /// Width of the overlaid clip in pixels; height follows its aspect ratio.
    pub width: u32,
    /// Distance from the right and bottom edges in pixels.
    pub margin: u32,
}

impl Default for PipLayout {
    fn default() -> Self {
        Self {
            width: 280,
            margin: 20,
        }
    }
}

/// Speaking style requested from the script generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Educational,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Educational => "educational",
        })
    }
}

/// Connection settings for the avatar render service.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RenderServiceConfig {
    /// API root, e.g. `https://tavusapi.com`.
    pub base_url: String,
    pub api_key: String,
    /// Presenter identity the service renders.
    pub replica_id: String,
}

impl RenderServiceConfig {
    /// Read `PDF2VIDEO_RENDER_URL`, `PDF2VIDEO_RENDER_API_KEY`, `PDF2VIDEO_REPLICA_ID`.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PDF2VIDEO_RENDER_URL")
                .unwrap_or_else(|_| "https://tavusapi.com".to_string()),
            api_key: std::env::var("PDF2VIDEO_RENDER_API_KEY").unwrap_or_default(),
            replica_id: std::env::var("PDF2VIDEO_REPLICA_ID").unwrap_or_default(),
        }
    }
}

impl fmt::Debug for RenderServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("replica_id", &self.replica_id)
            .finish()
    }
}

/// Configuration for a pipeline run.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf2video::PipelineConfig;
/// use std::time::Duration;
///
/// let config = PipelineConfig::builder()
///     .poll_interval(Duration::from_secs(5))
///     .max_poll_duration(Duration::from_secs(900))
///     .submit_concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    // ── Rasterising ───────────────────────────────────────────────────────
    /// Rendering DPI hint for page images. Range: 72–400. Default: 150.
    pub dpi: u32,

    /// Longest edge of a rendered page image in pixels. Default: 1920.
    ///
    /// Page images are scaled to 1280×720 when composited, so anything much
    /// above 1920 only costs disk space.
    pub max_rendered_pixels: u32,

    /// JPEG quality for page images (1–100). Default: 90.
    pub jpeg_quality: u8,

    // ── Rendering service ─────────────────────────────────────────────────
    pub render_service: RenderServiceConfig,

    /// Concurrent job submissions. Default: 4.
    pub submit_concurrency: usize,

    /// Sleep between poll sweeps. Default: 10 s.
    pub poll_interval: Duration,

    /// Elapsed-time ceiling for polling. Default: 600 s.
    ///
    /// When reached the run ends with the advisory
    /// [`Pdf2VideoError::RenderTimeout`] carrying links to the jobs still
    /// rendering.
    pub max_poll_duration: Duration,

    /// Optional ceiling on the number of sweeps, checked alongside
    /// `max_poll_duration`.
    pub max_poll_sweeps: Option<u32>,

    /// Timeout for downloading a rendered clip or a URL input, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    // ── Media tool ────────────────────────────────────────────────────────
    /// ffmpeg executable. Default: `ffmpeg` (resolved through `PATH`).
    pub ffmpeg_path: PathBuf,

    /// Wall-clock budget for one normalise/composite call. Default: 120 s.
    pub clip_timeout: Duration,

    /// Wall-clock budget for the final concatenation. Default: 300 s.
    pub concat_timeout: Duration,

    pub profile: MediaProfile,

    pub pip: PipLayout,

    // ── Locations ─────────────────────────────────────────────────────────
    /// Where finished videos are promoted to. Default: `./output`.
    pub output_dir: PathBuf,

    /// Parent directory for per-run workspaces. Default: system temp dir.
    pub work_root: Option<PathBuf>,

    // ── Script generation ─────────────────────────────────────────────────
    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.7; narration benefits from some variety.
    pub temperature: f32,

    /// Maximum tokens per generated script. Default: 2048.
    pub max_tokens: usize,

    /// Retries on a transient LLM failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Tone for summary-mode scripts. Default: professional.
    pub tone: Tone,

    /// Target length of a summary-mode script in seconds. Default: 120.
    pub target_duration_secs: u32,

    // ── Observability ─────────────────────────────────────────────────────
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_rendered_pixels: 1920,
            jpeg_quality: 90,
            render_service: RenderServiceConfig::default(),
            submit_concurrency: 4,
            poll_interval: Duration::from_secs(10),
            max_poll_duration: Duration::from_secs(600),
            max_poll_sweeps: None,
            download_timeout_secs: 120,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            clip_timeout: Duration::from_secs(120),
            concat_timeout: Duration::from_secs(300),
            profile: MediaProfile::default(),
            pip: PipLayout::default(),
            output_dir: PathBuf::from("output"),
            work_root: None,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.7,
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            tone: Tone::default(),
            target_duration_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("render_service", &self.render_service)
            .field("submit_concurrency", &self.submit_concurrency)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_duration", &self.max_poll_duration)
            .field("max_poll_sweeps", &self.max_poll_sweeps)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("clip_timeout", &self.clip_timeout)
            .field("concat_timeout", &self.concat_timeout)
            .field("profile", &self.profile)
            .field("pip", &self.pip)
            .field("output_dir", &self.output_dir)
            .field("work_root", &self.work_root)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("tone", &self.tone)
            .field("target_duration_secs", &self.target_duration_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn PipelineProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn render_service(mut self, svc: RenderServiceConfig) -> Self {
        self.config.render_service = svc;
        self
    }

    pub fn submit_concurrency(mut self, n: usize) -> Self {
        self.config.submit_concurrency = n.max(1);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn max_poll_duration(mut self, d: Duration) -> Self {
        self.config.max_poll_duration = d;
        self
    }

    pub fn max_poll_sweeps(mut self, n: u32) -> Self {
        self.config.max_poll_sweeps = Some(n);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ffmpeg_path = path.into();
        self
    }

    pub fn clip_timeout(mut self, d: Duration) -> Self {
        self.config.clip_timeout = d;
        self
    }

    pub fn concat_timeout(mut self, d: Duration) -> Self {
        self.config.concat_timeout = d;
        self
    }

    pub fn profile(mut self, profile: MediaProfile) -> Self {
        self.config.profile = profile;
        self
    }

    pub fn pip(mut self, pip: PipLayout) -> Self {
        self.config.pip = pip;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_root = Some(dir.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn tone(mut self, tone: Tone) -> Self {
        self.config.tone = tone;
        self
    }

    pub fn target_duration_secs(mut self, secs: u32) -> Self {
        self.config.target_duration_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, Pdf2VideoError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(Pdf2VideoError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.poll_interval.is_zero() {
            return Err(Pdf2VideoError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if c.max_poll_sweeps == Some(0) {
            return Err(Pdf2VideoError::InvalidConfig(
                "max poll sweeps must be ≥ 1".into(),
            ));
        }
        if c.clip_timeout.is_zero() || c.concat_timeout.is_zero() {
            return Err(Pdf2VideoError::InvalidConfig(
                "media tool timeouts must be greater than zero".into(),
            ));
        }
        let p = &c.profile;
        if p.width == 0 || p.height == 0 || p.width % 2 != 0 || p.height % 2 != 0 {
            return Err(Pdf2VideoError::InvalidConfig(format!(
                "profile frame size must be even and non-zero, got {}x{}",
                p.width, p.height
            )));
        }
        if p.fps == 0 {
            return Err(Pdf2VideoError::InvalidConfig("profile fps must be ≥ 1".into()));
        }
        if c.pip.width == 0 || c.pip.width + c.pip.margin > p.width {
            return Err(Pdf2VideoError::InvalidConfig(format!(
                "overlay width {} + margin {} does not fit a {} px frame",
                c.pip.width, c.pip.margin, p.width
            )));
        }
        Ok(self.config)
    }
}
