//! ffmpeg invocation: normalise, composite and concatenate clips.
//!
//! ## Why argument vectors?
//!
//! Paths come from downloads and user-chosen directories. Passing them as
//! separate argv entries to `tokio::process::Command` means no shell ever
//! parses them, so quotes or `$(…)` in a filename are just bytes.
//!
//! ## Timeouts
//!
//! Every call runs under `tokio::time::timeout`. The child is spawned with
//! `kill_on_drop(true)`; when the budget runs out the wait future is dropped
//! and the process is killed with it.
//!
//! ## The canonical profile
//!
//! Normalise and composite both emit the same frame size, frame rate, pixel
//! format and codecs ([`MediaProfile`]), which is what lets the final
//! concatenation stream-copy with `-c copy`.

use crate::config::{MediaProfile, PipLayout, PipelineConfig};
use crate::error::Pdf2VideoError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Longest stderr excerpt kept in an error.
const STDERR_TAIL_CHARS: usize = 2000;

/// External media processing used by the stitching stage.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Re-encode `input` to the canonical profile, letterboxing as needed.
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), Pdf2VideoError>;

    /// Overlay `foreground` on the still `background`. Output lasts as long
    /// as `foreground` and carries its audio.
    async fn composite(
        &self,
        background: &Path,
        foreground: &Path,
        output: &Path,
    ) -> Result<(), Pdf2VideoError>;

    /// Join the clips listed in `manifest` by stream copy.
    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), Pdf2VideoError>;
}

/// How a tool invocation went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stderr: String,
}

/// [`MediaTool`] backed by the ffmpeg executable.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    pub program: PathBuf,
    pub profile: MediaProfile,
    pub pip: PipLayout,
    pub clip_timeout: Duration,
    pub concat_timeout: Duration,
}

impl FfmpegTool {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            program: config.ffmpeg_path.clone(),
            profile: config.profile.clone(),
            pip: config.pip,
            clip_timeout: config.clip_timeout,
            concat_timeout: config.concat_timeout,
        }
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    async fn normalize(&self, input: &Path, output: &Path) -> Result<(), Pdf2VideoError> {
        let args = normalize_args(&self.profile, input, output);
        run_tool(&self.program, &args, self.clip_timeout)
            .await
            .map_err(|f| Pdf2VideoError::EncodeFailed {
                exit_code: f.exit_code,
                timed_out: f.timed_out,
                stderr: f.stderr,
            })
    }

    async fn composite(
        &self,
        background: &Path,
        foreground: &Path,
        output: &Path,
    ) -> Result<(), Pdf2VideoError> {
        let args = composite_args(&self.profile, self.pip, background, foreground, output);
        run_tool(&self.program, &args, self.clip_timeout)
            .await
            .map_err(|f| Pdf2VideoError::CompositeFailed {
                exit_code: f.exit_code,
                timed_out: f.timed_out,
                stderr: f.stderr,
            })
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> Result<(), Pdf2VideoError> {
        let args = concat_args(manifest, output);
        run_tool(&self.program, &args, self.concat_timeout)
            .await
            .map_err(|f| Pdf2VideoError::ConcatFailed {
                exit_code: f.exit_code,
                timed_out: f.timed_out,
                stderr: f.stderr,
            })
    }
}

// ── Argument builders ────────────────────────────────────────────────────────

fn encode_tail(profile: &MediaProfile) -> Vec<OsString> {
    [
        "-c:v".to_string(),
        profile.video_codec.clone(),
        "-preset".into(),
        profile.preset.clone(),
        "-crf".into(),
        profile.crf.to_string(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        profile.audio_codec.clone(),
        "-ar".into(),
        profile.audio_sample_rate.to_string(),
        "-ac".into(),
        profile.audio_channels.to_string(),
        "-r".into(),
        profile.fps.to_string(),
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
}

fn head() -> Vec<OsString> {
    ["-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// `ffmpeg` arguments that bring one clip to the canonical profile.
pub fn normalize_args(profile: &MediaProfile, input: &Path, output: &Path) -> Vec<OsString> {
    let (w, h) = (profile.width, profile.height);
    let mut args = head();
    args.push("-i".into());
    args.push(input.as_os_str().to_owned());
    args.extend(encode_tail(profile));
    args.push("-vf".into());
    args.push(
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2"
        )
        .into(),
    );
    args.push(output.as_os_str().to_owned());
    args
}

/// `ffmpeg` arguments for the picture-in-picture composite.
pub fn composite_args(
    profile: &MediaProfile,
    pip: PipLayout,
    background: &Path,
    foreground: &Path,
    output: &Path,
) -> Vec<OsString> {
    let (w, h) = (profile.width, profile.height);
    let m = pip.margin;
    let mut args = head();
    args.extend(["-loop", "1", "-i"].map(OsString::from));
    args.push(background.as_os_str().to_owned());
    args.push("-i".into());
    args.push(foreground.as_os_str().to_owned());
    args.push("-filter_complex".into());
    args.push(
        format!(
            "[0:v]scale={w}:{h}[bg];[1:v]scale={}:-2[avatar];\
             [bg][avatar]overlay=W-w-{m}:H-h-{m}:shortest=1[out]",
            pip.width
        )
        .into(),
    );
    args.extend(["-map", "[out]", "-map", "1:a"].map(OsString::from));
    args.extend(encode_tail(profile));
    args.push("-shortest".into());
    args.push(output.as_os_str().to_owned());
    args
}

/// `ffmpeg` arguments for a manifest-driven stream-copy join.
pub fn concat_args(manifest: &Path, output: &Path) -> Vec<OsString> {
    let mut args = head();
    args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
    args.push(manifest.as_os_str().to_owned());
    args.extend(["-c", "copy"].map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

/// Concat-demuxer manifest listing `clips` in order.
///
/// Single quotes inside a path are written as `'\''`, the demuxer's escape.
pub fn concat_manifest(clips: &[PathBuf]) -> String {
    let mut out = String::new();
    for clip in clips {
        let escaped = clip.to_string_lossy().replace('\'', r"'\''");
        out.push_str("file '");
        out.push_str(&escaped);
        out.push_str("'\n");
    }
    out
}

// ── Process runner ───────────────────────────────────────────────────────────

/// Run `program args…`, enforcing `budget`.
pub async fn run_tool(
    program: &Path,
    args: &[OsString],
    budget: Duration,
) -> Result<(), ToolFailure> {
    debug!("Running {} {:?}", program.display(), args);

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ToolFailure {
            exit_code: None,
            timed_out: false,
            stderr: format!("could not start {}: {}", program.display(), e),
        })?;

    match tokio::time::timeout(budget, child.wait_with_output()).await {
        Err(_) => Err(ToolFailure {
            exit_code: None,
            timed_out: true,
            stderr: format!("no result within {}s; process killed", budget.as_secs()),
        }),
        Ok(Err(e)) => Err(ToolFailure {
            exit_code: None,
            timed_out: false,
            stderr: e.to_string(),
        }),
        Ok(Ok(out)) if out.status.success() => Ok(()),
        Ok(Ok(out)) => Err(ToolFailure {
            exit_code: out.status.code(),
            timed_out: false,
            stderr: stderr_tail(&String::from_utf8_lossy(&out.stderr)),
        }),
    }
}

fn stderr_tail(stderr: &str) -> String {
    let trimmed = stderr.trim();
    let count = trimmed.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return trimmed.to_string();
    }
    let skip = count - STDERR_TAIL_CHARS;
    let tail: String = trimmed.chars().skip(skip).collect();
    format!("…{tail}")
}
