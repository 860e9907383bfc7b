//! Input resolution: turn a user-supplied path or URL into document bytes.
//!
//! Local files and downloads both end up as an in-memory buffer; the
//! rasteriser stages its own copy on disk when pdfium needs a path. The PDF
//! magic bytes (`%PDF`) are checked here so a wrong upload fails with
//! `UnsupportedDocument` before any service is contacted.

use crate::error::Pdf2VideoError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Largest document accepted, in bytes.
pub const MAX_DOCUMENT_BYTES: usize = 20 * 1024 * 1024;

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load the document named by `input` (local path or HTTP/HTTPS URL).
pub async fn load_document(input: &str, timeout_secs: u64) -> Result<Vec<u8>, Pdf2VideoError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    validate_document(input, &bytes)?;
    Ok(bytes)
}

/// Reject oversized or non-PDF input.
pub fn validate_document(input: &str, bytes: &[u8]) -> Result<(), Pdf2VideoError> {
    if bytes.len() > MAX_DOCUMENT_BYTES {
        return Err(Pdf2VideoError::InvalidInput {
            input: input.to_string(),
            reason: format!(
                "document is {} bytes, the limit is {} MB",
                bytes.len(),
                MAX_DOCUMENT_BYTES / (1024 * 1024)
            ),
        });
    }
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(Pdf2VideoError::UnsupportedDocument {
            detail: format!("not a PDF (first bytes: {magic:?})"),
        });
    }
    Ok(())
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, Pdf2VideoError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local document: {} ({} bytes)", path.display(), bytes.len());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Pdf2VideoError::FileNotFound { path })
        }
        Err(e) => Err(Pdf2VideoError::InvalidInput {
            input: path_str.to_string(),
            reason: e.to_string(),
        }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, Pdf2VideoError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Pdf2VideoError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Pdf2VideoError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
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

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Pdf2VideoError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn rejects_non_pdf() {
        let err = validate_document("x.docx", b"PK\x03\x04rest").unwrap_err();
        assert!(matches!(err, Pdf2VideoError::UnsupportedDocument { .. }));
    }

    #[test]
    fn rejects_short_input() {
        assert!(validate_document("x", b"%P").is_err());
    }

    #[test]
    fn accepts_pdf_magic() {
        assert!(validate_document("x.pdf", b"%PDF-1.7\n...").is_ok());
    }

    #[test]
    fn rejects_oversized() {
        let mut big = b"%PDF".to_vec();
        big.resize(MAX_DOCUMENT_BYTES + 1, 0);
        let err = validate_document("big.pdf", &big).unwrap_err();
        assert!(matches!(err, Pdf2VideoError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let err = load_document("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, Pdf2VideoError::FileNotFound { .. }));
    }
}
