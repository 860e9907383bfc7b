//! Avatar render service: submit narration, query job status, fetch clips.
//!
//! The HTTP implementation speaks a Tavus-style API:
//!
//! ```text
//! POST {base}/v2/videos        {replica_id, script, video_name} → {video_id, …}
//! GET  {base}/v2/videos/{id}   → {video_id, status, hosted_url, download_url?, error_message?}
//! ```
//!
//! Requests authenticate with an `x-api-key` header.

use crate::config::RenderServiceConfig;
use crate::error::Pdf2VideoError;
use crate::output::{RenderJobUpdate, RenderStatus};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Remote rendering of narration scripts into presenter clips.
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Submit one script; returns the remote job id.
    async fn submit(&self, script: &str, label: &str) -> Result<String, Pdf2VideoError>;

    /// Query a job's current state.
    async fn status(&self, remote_job_id: &str) -> Result<RenderJobUpdate, Pdf2VideoError>;

    /// Fetch a finished clip to `dest`.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), Pdf2VideoError>;
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    replica_id: &'a str,
    script: &'a str,
    video_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct VideoResponse {
    video_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    hosted_url: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Map the service's status strings onto [`RenderStatus`].
///
/// `error` and `deleted` are both terminal failures. Unknown values are
/// treated as still generating.
pub fn parse_status(raw: &str) -> RenderStatus {
    match raw {
        "queued" => RenderStatus::Queued,
        "ready" => RenderStatus::Ready,
        "error" | "deleted" => RenderStatus::Failed,
        _ => RenderStatus::Generating,
    }
}

/// reqwest-backed [`RenderService`].
pub struct HttpRenderService {
    client: reqwest::Client,
    config: RenderServiceConfig,
    download_timeout: Duration,
}

impl HttpRenderService {
    pub fn new(config: RenderServiceConfig, download_timeout_secs: u64) -> Result<Self, Pdf2VideoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Pdf2VideoError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            download_timeout: Duration::from_secs(download_timeout_secs),
        })
    }

    fn videos_url(&self) -> String {
        format!("{}/v2/videos", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RenderService for HttpRenderService {
    async fn submit(&self, script: &str, label: &str) -> Result<String, Pdf2VideoError> {
        let fail = |message: String| Pdf2VideoError::SubmitFailed {
            label: label.to_string(),
            message,
        };
        if script.trim().is_empty() {
            return Err(fail("script is empty".into()));
        }
        if self.config.api_key.is_empty() || self.config.replica_id.is_empty() {
            return Err(fail(
                "render service API key or replica id not set \
                 (PDF2VIDEO_RENDER_API_KEY / PDF2VIDEO_REPLICA_ID)"
                    .into(),
            ));
        }

        let body = SubmitRequest {
            replica_id: &self.config.replica_id,
            script,
            video_name: label,
        };
        let response = self
            .client
            .post(self.videos_url())
            .header("x-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(fail(format!("HTTP {status}: {}", text.trim())));
        }
        let video: VideoResponse = response.json().await.map_err(|e| fail(e.to_string()))?;
        debug!("Submitted '{}' as job {}", label, video.video_id);
        Ok(video.video_id)
    }

    async fn status(&self, remote_job_id: &str) -> Result<RenderJobUpdate, Pdf2VideoError> {
        let url = format!("{}/{}", self.videos_url(), remote_job_id);
        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.config.api_key)
            .send()
            .await
            .map_err(|e| Pdf2VideoError::DownloadFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(Pdf2VideoError::DownloadFailed {
                url,
                reason: format!("HTTP {}", response.status()),
            });
        }
        let video: VideoResponse =
            response
                .json()
                .await
                .map_err(|e| Pdf2VideoError::DownloadFailed {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        Ok(RenderJobUpdate {
            status: video
                .status
                .as_deref()
                .map(parse_status)
                .unwrap_or(RenderStatus::Generating),
            hosted_url: video.hosted_url,
            download_url: video.download_url,
            error_message: video.error_message,
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), Pdf2VideoError> {
        let secs = self.download_timeout.as_secs();
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Pdf2VideoError::DownloadTimeout {
                        url: url.to_string(),
                        secs,
                    }
                } else {
                    Pdf2VideoError::DownloadFailed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;
        if !response.status().is_success() {
            return Err(Pdf2VideoError::DownloadFailed {
                url: url.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Pdf2VideoError::workspace(dest, e))?;
        let mut stream = response.bytes_stream();
        let mut written = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Pdf2VideoError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Pdf2VideoError::workspace(dest, e))?;
            written += chunk.len();
        }
        file.flush()
            .await
            .map_err(|e| Pdf2VideoError::workspace(dest, e))?;
        debug!("Downloaded {} bytes → {}", written, dest.display());
        Ok(())
    }
}
