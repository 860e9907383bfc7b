//! End-to-end tests for edgequake-pdf2video.
//!
//! These use real PDF files in `./test_cases/`, pdfium, ffmpeg, a live LLM
//! and a live render service. They are gated behind `E2E_ENABLED` so they
//! never run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture
//!
//! `test_inspect` only needs pdfium; the conversion test also needs
//! `OPENAI_API_KEY`, `PDF2VIDEO_RENDER_API_KEY` and `PDF2VIDEO_REPLICA_ID`.

use edgequake_pdf2video::{
    convert, inspect, ConversionMode, PipelineConfig, RenderServiceConfig, Stage, Tone,
};
use std::path::PathBuf;
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP: test file not found: {}", p.display());
            return;
        }
        p
    }};
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("short_deck.pdf"));

    let info = inspect(pdf.to_string_lossy()).await.expect("inspect failed");
    assert!(info.page_count >= 1);
    assert!(info.character_count > 0, "deck should have a text layer");
}

#[tokio::test]
async fn test_summary_video() {
    let pdf = e2e_skip_unless_ready!(test_cases_dir().join("short_deck.pdf"));
    let render = RenderServiceConfig::from_env();
    if render.api_key.is_empty() || render.replica_id.is_empty() {
        println!("SKIP: render service credentials not set");
        return;
    }

    let out = tempfile::tempdir().unwrap();
    let config = PipelineConfig::builder()
        .render_service(render)
        .output_dir(out.path())
        .tone(Tone::Educational)
        .target_duration_secs(30)
        .max_poll_duration(Duration::from_secs(1200))
        .build()
        .unwrap();

    match convert(pdf.to_string_lossy(), ConversionMode::Summary, &config).await {
        Ok(output) => {
            let size = std::fs::metadata(&output.video_path).unwrap().len();
            assert!(size > 0, "video is empty");
            assert_eq!(output.segments.len(), 1);
            println!("video: {} ({} bytes)", output.video_path.display(), size);
        }
        // A slow render service is not a test failure.
        Err(e) if e.is_advisory() => {
            assert_eq!(e.stage, Stage::GeneratingVideos);
            println!("render still in progress: {e}");
        }
        Err(e) => panic!("conversion failed: {e}"),
    }
}

#[tokio::test]
async fn test_not_a_pdf_is_rejected() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP: set E2E_ENABLED=1 to run e2e tests");
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.pdf");
    std::fs::write(&path, b"just some text").unwrap();

    let err = inspect(path.to_string_lossy()).await.unwrap_err();
    assert!(err.to_string().contains("not a PDF"), "got: {err}");
}
