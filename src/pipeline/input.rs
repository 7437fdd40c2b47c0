//! Input resolution: turn a user-supplied path or URL into an [`ImageInput`].
//!
//! Both endpoints accept either inline image data or a URL the model can
//! fetch itself, so a URL input is passed through untouched. Only the image
//! relay needs the actual bytes of a remote image; [`fetch_bytes`] downloads
//! them on demand.

use crate::error::ExtractError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// A document image ready to be encoded or referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Raw file contents with the name used for uploads.
    Bytes { bytes: Vec<u8>, filename: String },
    /// Publicly fetchable http(s) URL.
    Url(String),
}

impl ImageInput {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        ImageInput::Bytes {
            bytes: bytes.into(),
            filename: filename.into(),
        }
    }

    /// Upload filename; derived from the URL path for URL inputs.
    pub fn filename(&self) -> String {
        match self {
            ImageInput::Bytes { filename, .. } => filename.clone(),
            ImageInput::Url(url) => filename_from_url(url),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string: URLs pass through, paths are read into memory.
pub async fn resolve_input(input: &str) -> Result<ImageInput, ExtractError> {
    if is_url(input) {
        debug!("Using remote image URL: {}", input);
        Ok(ImageInput::Url(input.to_string()))
    } else {
        read_local(Path::new(input)).await
    }
}

/// Read a local file, mapping I/O failures onto input errors.
pub async fn read_local(path: &Path) -> Result<ImageInput, ExtractError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExtractError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => ExtractError::InputReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());

    debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(ImageInput::Bytes { bytes, filename })
}

/// Make sure the input carries bytes, downloading URL inputs.
pub async fn fetch_bytes(input: ImageInput, timeout_secs: u64) -> Result<ImageInput, ExtractError> {
    match input {
        ImageInput::Bytes { .. } => Ok(input),
        ImageInput::Url(url) => download_url(&url, timeout_secs).await,
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ImageInput, ExtractError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        let reason = if e.is_timeout() {
            format!("timed out after {timeout_secs}s")
        } else {
            e.to_string()
        };
        ExtractError::DownloadFailed {
            url: url.to_string(),
            reason,
        }
    })?;

    if !response.status().is_success() {
        return Err(ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ExtractError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(ImageInput::Bytes {
        bytes: bytes.to_vec(),
        filename: filename_from_url(url),
    })
}

/// Extract a reasonable filename from the URL path.
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

    "document.png".to_string()
}
