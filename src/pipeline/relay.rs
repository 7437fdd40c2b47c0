//! Image relay: publish local bytes on an image host so a remote model can
//! fetch them by URL.
//!
//! A single multipart POST (`key`, `source`) per upload, never retried. Every
//! failure is logged and collapses to `None`; callers fall back to sending a
//! `data:` URI instead.

use crate::config::ExtractionConfig;
use crate::credentials::CredentialResolver;
use crate::pipeline::encode::sniff_mime;
use crate::pipeline::endpoint::excerpt;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Characters of a provider error body kept in the log line.
const ERROR_EXCERPT_CHARS: usize = 300;

/// Upload client for the configured image host.
#[derive(Clone)]
pub struct ImageRelay {
    http: reqwest::Client,
    upload_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ImageRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageRelay")
            .field("upload_url", &self.upload_url)
            .field("enabled", &self.api_key.is_some())
            .finish()
    }
}

impl ImageRelay {
    /// Build a relay. `api_key = None` yields a disabled relay.
    pub fn new(
        upload_url: impl Into<String>,
        api_key: Option<String>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Relay HTTP client build failed ({}); using defaults", e);
                reqwest::Client::new()
            });
        Self {
            http,
            upload_url: upload_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Relay for `config`, with the hosting key resolved from config,
    /// secret store or environment.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let api_key = CredentialResolver::from_config(config).resolve_relay_api_key();
        Self::new(
            config.relay_url.clone(),
            api_key,
            Duration::from_secs(config.relay_connect_timeout_secs),
            Duration::from_secs(config.relay_read_timeout_secs),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Upload `bytes` and return the hosted URL, or `None` on any failure.
    pub async fn upload_image(&self, bytes: &[u8], filename: &str) -> Option<String> {
        let Some(ref api_key) = self.api_key else {
            debug!("Image relay disabled: no hosting API key");
            return None;
        };

        info!("Uploading {} ({} bytes) to image host", filename, bytes.len());

        let mut part = Part::bytes(bytes.to_vec()).file_name(filename.to_string());
        let mime = sniff_mime(bytes);
        part = match part.mime_str(mime) {
            Ok(p) => p,
            Err(e) => {
                warn!("Invalid MIME '{}' for {}: {}", mime, filename, e);
                return None;
            }
        };
        let form = Form::new().text("key", api_key.clone()).part("source", part);

        let response = match self.http.post(&self.upload_url).multipart(form).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!("Image upload timed out: {}", e);
                return None;
            }
            Err(e) => {
                warn!("Image upload failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Could not read image host response: {}", e);
                return None;
            }
        };

        match hosted_url(&text) {
            Some(url) => {
                info!("Image hosted at {}", url);
                Some(url)
            }
            None => {
                warn!(
                    "Image host rejected upload (HTTP {}): {}",
                    status.as_u16(),
                    provider_error(&text)
                );
                None
            }
        }
    }
}

/// `image.url` from a success envelope (`status_code == 200`).
fn hosted_url(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    if v.get("status_code")?.as_u64()? != 200 {
        return None;
    }
    v.get("image")?
        .get("url")?
        .as_str()
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}

/// The provider's `error.message`, else an excerpt of the raw body.
fn provider_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| excerpt(body, ERROR_EXCERPT_CHARS))
}
