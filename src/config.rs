//! Configuration types for schema-driven extraction.
//!
//! All client behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Credentials left unset here are resolved
//! later by [`crate::credentials::CredentialResolver`] from the secret store
//! and the environment.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default image-hosting upload endpoint used by the relay.
pub const DEFAULT_RELAY_URL: &str = "https://freeimage.host/api/1/upload";

/// Configuration for extraction, schema suggestion and image relay calls.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .endpoint_url("https://xyz.endpoints.huggingface.cloud")
///     .max_retries(5)
///     .api_timeout_secs(45)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Extraction endpoint URL. If None, resolved from the environment or secret store.
    pub endpoint_url: Option<String>,

    /// Bearer token for the extraction endpoint. If None, resolved from the
    /// secret store or `HUGGINGFACE_API_KEY`.
    pub api_key: Option<String>,

    /// Path of the TOML secret store. If None, `EXTRACT_SECRETS_FILE` or
    /// `.secrets/secrets.toml` is tried.
    pub secrets_path: Option<PathBuf>,

    /// Total attempts per endpoint call (not additional retries). Default: 3.
    pub max_retries: u32,

    /// Backoff base in milliseconds. The wait before retry `n` is
    /// `retry_backoff_ms * 2^n`, so the default 1000 gives 1 s → 2 s → 4 s.
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout for the extraction endpoint in seconds. Default: 30.
    pub api_timeout_secs: u64,

    /// Per-attempt timeout for the chat-completions endpoint in seconds. Default: 60.
    pub suggest_timeout_secs: u64,

    /// `max_tokens` sent with schema-suggestion requests. Default: 256.
    pub suggest_max_tokens: usize,

    /// Optional `model` member for schema-suggestion requests.
    pub suggest_model: Option<String>,

    /// Image-hosting upload URL. Default: [`DEFAULT_RELAY_URL`].
    pub relay_url: String,

    /// Image-hosting API key. If None, resolved from the secret store or
    /// `IMAGE_HOST_API_KEY`; without one the relay is disabled.
    pub relay_api_key: Option<String>,

    /// Relay connect timeout in seconds. Default: 10.
    pub relay_connect_timeout_secs: u64,

    /// Relay read timeout in seconds, reset on every successful read. Default: 60.
    pub relay_read_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional progress callback for attempt/retry events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            api_key: None,
            secrets_path: None,
            max_retries: 3,
            retry_backoff_ms: 1000,
            api_timeout_secs: 30,
            suggest_timeout_secs: 60,
            suggest_max_tokens: 256,
            suggest_model: None,
            relay_url: DEFAULT_RELAY_URL.to_string(),
            relay_api_key: None,
            relay_connect_timeout_secs: 10,
            relay_read_timeout_secs: 60,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ExtractionConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &redact(&self.api_key))
            .field("secrets_path", &self.secrets_path)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("suggest_timeout_secs", &self.suggest_timeout_secs)
            .field("suggest_max_tokens", &self.suggest_max_tokens)
            .field("suggest_model", &self.suggest_model)
            .field("relay_url", &self.relay_url)
            .field("relay_api_key", &redact(&self.relay_api_key))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Retry policy for the extraction endpoint.
    pub fn extraction_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.api_timeout_secs),
            backoff_base: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    /// Retry policy for the chat-completions endpoint.
    pub fn suggestion_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.suggest_timeout_secs),
            ..self.extraction_policy()
        }
    }
}

/// Attempt budget, per-attempt timeout and backoff base for one endpoint call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub timeout: Duration,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Wait before the attempt that follows failed attempt `attempt` (0-indexed).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        ExtractionConfig::default().extraction_policy()
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint_url = Some(url.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn secrets_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.secrets_path = Some(path.into());
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.max(1);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn suggest_timeout_secs(mut self, secs: u64) -> Self {
        self.config.suggest_timeout_secs = secs;
        self
    }

    pub fn suggest_max_tokens(mut self, n: usize) -> Self {
        self.config.suggest_max_tokens = n.max(1);
        self
    }

    pub fn suggest_model(mut self, model: impl Into<String>) -> Self {
        self.config.suggest_model = Some(model.into());
        self
    }

    pub fn relay_url(mut self, url: impl Into<String>) -> Self {
        self.config.relay_url = url.into();
        self
    }

    pub fn relay_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.relay_api_key = Some(key.into());
        self
    }

    pub fn relay_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.relay_connect_timeout_secs = secs;
        self
    }

    pub fn relay_read_timeout_secs(mut self, secs: u64) -> Self {
        self.config.relay_read_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(ExtractError::Config(
                "max_retries must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.suggest_timeout_secs == 0 {
            return Err(ExtractError::Config(
                "API timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.relay_connect_timeout_secs > c.relay_read_timeout_secs {
            return Err(ExtractError::Config(format!(
                "relay connect timeout ({}s) exceeds read timeout ({}s)",
                c.relay_connect_timeout_secs, c.relay_read_timeout_secs
            )));
        }
        if let Some(ref url) = c.endpoint_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ExtractError::Config(format!(
                    "endpoint URL must start with http:// or https://, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = ExtractionConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.api_timeout_secs, 30);
        assert_eq!(c.suggest_timeout_secs, 60);
        assert_eq!(c.suggest_max_tokens, 256);
        assert_eq!(c.relay_url, DEFAULT_RELAY_URL);
    }

    #[test]
    fn backoff_doubles_from_base() {
        let p = ExtractionConfig::default().extraction_policy();
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(2), Duration::from_secs(4));
    }

    #[test]
    fn suggestion_policy_uses_longer_timeout() {
        let c = ExtractionConfig::default();
        assert_eq!(c.suggestion_policy().timeout, Duration::from_secs(60));
        assert_eq!(c.suggestion_policy().max_retries, c.max_retries);
    }

    #[test]
    fn builder_clamps_retries() {
        let c = ExtractionConfig::builder().max_retries(0).build().unwrap();
        assert_eq!(c.max_retries, 1);
    }

    #[test]
    fn builder_rejects_non_http_endpoint() {
        let err = ExtractionConfig::builder()
            .endpoint_url("ftp://nope")
            .build()
            .unwrap_err();
        assert!(matches!(err, ExtractError::Config(_)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let c = ExtractionConfig::builder()
            .api_key("hf_secret")
            .relay_api_key("relay_secret")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hf_secret"));
        assert!(!dbg.contains("relay_secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
