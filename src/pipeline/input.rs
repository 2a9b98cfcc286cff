//! Input resolution: turn a user-supplied path or URL into a [`SourceDocument`].
//!
//! Everything downstream works on bytes in memory (pdfium can load a PDF
//! straight from a byte slice), so URLs are downloaded into a buffer rather
//! than a temp file. The media type is sniffed here once: magic bytes first,
//! then the file extension, then a download's Content-Type.

use crate::document::{MediaType, SourceDocument};
use crate::error::DocExtractError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to an in-memory document.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, DocExtractError> {
    if input.trim().is_empty() {
        return Err(DocExtractError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<SourceDocument, DocExtractError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocExtractError::PermissionDenied { path });
        }
        Err(_) => return Err(DocExtractError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());
    let doc = SourceDocument::new(name, bytes);
    debug!(
        "Resolved local document: {} ({}, {} bytes)",
        path.display(),
        doc.media_type,
        doc.bytes.len()
    );
    Ok(doc)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, DocExtractError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocExtractError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocExtractError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let name = filename_from_url(url);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(MediaType::from_mime);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes as '{}'", bytes.len(), name);
    Ok(downloaded_document(name, bytes.to_vec(), content_type))
}

/// Build a downloaded document. Without a recognised extension in the URL,
/// a known Content-Type decides the media type unless the bytes say otherwise.
fn downloaded_document(name: String, bytes: Vec<u8>, content_type: Option<MediaType>) -> SourceDocument {
    let doc = SourceDocument::new(name, bytes);
    match content_type {
        Some(media_type)
            if MediaType::from_extension(&doc.name).is_none()
                && MediaType::from_magic(&doc.bytes).is_none() =>
        {
            SourceDocument::with_media_type(doc.name, doc.bytes, media_type)
        }
        _ => doc,
    }
}

/// Last non-empty path segment of a URL, or a generic fallback.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }
    "downloaded".to_string()
}
