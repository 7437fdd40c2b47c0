//! Retrying HTTP client for the inference endpoints.
//!
//! ## Retry Strategy
//!
//! Each call gets `max_retries` attempts in total. Before attempt `n + 1`
//! the loop sleeps `backoff_base * 2^n` (1 s → 2 s → 4 s with the default
//! base); nothing sleeps after the final attempt.
//!
//! | Failure | Retried | Error on exhaustion |
//! |---------|---------|---------------------|
//! | timeout | yes | [`ExtractError::Timeout`] |
//! | HTTP 401 | **no**, fails at once | [`ExtractError::Auth`] |
//! | other non-2xx | yes | [`ExtractError::Http`] |
//! | connect / DNS / TLS / body read | yes | [`ExtractError::Request`] |
//! | 2xx body that is not JSON | yes | [`ExtractError::Unexpected`] |
//!
//! The same loop serves the extraction endpoint and the chat-completions
//! endpoint; only the URL, body and policy differ.

use crate::config::{ExtractionConfig, RetryPolicy};
use crate::credentials::CredentialResolver;
use crate::error::ExtractError;
use crate::pipeline::payload::Payload;
use crate::progress::ProgressCallback;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Maximum number of response-body characters carried into error messages.
const BODY_EXCERPT_CHARS: usize = 500;

/// Client bound to one endpoint URL and bearer token.
///
/// Holds no per-call state; every call builds its own request.
#[derive(Clone)]
pub struct EndpointClient {
    http: reqwest::Client,
    endpoint_url: String,
    api_key: String,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for EndpointClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointClient")
            .field("endpoint_url", &self.endpoint_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// A decoded JSON body and the number of attempts it took.
#[derive(Debug, Clone)]
pub struct Attempted {
    pub value: Value,
    pub attempts: u32,
}

impl EndpointClient {
    pub fn new(endpoint_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ExtractError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ExtractError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint_url: endpoint_url.into(),
            api_key: api_key.into(),
            progress: None,
        })
    }

    /// Resolve credentials for `config` and build a client.
    ///
    /// Setup errors ([`ExtractError::Credential`], [`ExtractError::Config`])
    /// surface here, before any request is sent.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractError> {
        let resolver = CredentialResolver::from_config(config);
        let api_key = resolver.resolve_api_key()?;
        let endpoint_url = resolver.resolve_endpoint_url()?;
        debug!("Extraction endpoint: {}", endpoint_url);

        let mut client = Self::new(endpoint_url, api_key)?;
        client.progress = config.progress_callback.clone();
        Ok(client)
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// POST `payload` to the extraction endpoint and return the decoded body.
    pub async fn call_endpoint(&self, payload: &Payload, policy: &RetryPolicy) -> Result<Value, ExtractError> {
        self.call_endpoint_counted(payload, policy)
            .await
            .map(|a| a.value)
    }

    /// Like [`Self::call_endpoint`], also reporting how many attempts it took.
    pub async fn call_endpoint_counted(
        &self,
        payload: &Payload,
        policy: &RetryPolicy,
    ) -> Result<Attempted, ExtractError> {
        let url = self.endpoint_url.clone();
        self.post_json_with_retry(&url, payload, policy).await
    }

    /// POST a JSON body to `url` under `policy`.
    pub(crate) async fn post_json_with_retry<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        policy: &RetryPolicy,
    ) -> Result<Attempted, ExtractError> {
        let max = policy.max_retries;

        for attempt in 0..max {
            let n = attempt + 1;
            info!("Calling {} (attempt {}/{})", url, n, max);
            if let Some(ref cb) = self.progress {
                cb.on_attempt_start(n, max);
            }

            let err = match self.attempt_once(url, body, policy).await {
                Ok(value) => {
                    debug!("Attempt {}/{} succeeded", n, max);
                    if let Some(ref cb) = self.progress {
                        cb.on_success(n);
                    }
                    return Ok(Attempted { value, attempts: n });
                }
                Err(e) => e,
            };

            let msg = err.to_string();
            if let Some(ref cb) = self.progress {
                cb.on_attempt_failed(n, max, &msg);
            }

            let failed = err.exhausted(n);
            if !failed.kind().is_retryable() {
                error!("Attempt {}/{} failed: {}; not retryable", n, max, msg);
                return Err(failed);
            }

            if n == max {
                error!("Attempt {}/{} failed: {}; giving up", n, max, msg);
                return Err(failed);
            }

            let delay = policy.backoff(attempt);
            warn!("Attempt {}/{} failed: {}; retrying in {:?}", n, max, msg, delay);
            if let Some(ref cb) = self.progress {
                cb.on_backoff(n + 1, delay);
            }
            sleep(delay).await;
        }

        Err(ExtractError::Unexpected {
            attempts: 0,
            detail: "no attempts were made (max_retries = 0)".to_string(),
        })
    }

    async fn attempt_once<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        policy: &RetryPolicy,
    ) -> Result<Value, AttemptError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(policy.timeout)
            .json(body)
            .send()
            .await
            .map_err(AttemptError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = excerpt(&body, BODY_EXCERPT_CHARS);
            return Err(if status == reqwest::StatusCode::UNAUTHORIZED {
                AttemptError::Unauthorized { body }
            } else {
                AttemptError::Status {
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let text = response
            .text()
            .await
            .map_err(AttemptError::from_transport)?;

        serde_json::from_str(&text).map_err(|e| AttemptError::Unexpected {
            detail: format!(
                "response body is not JSON ({e}): {}",
                excerpt(&text, BODY_EXCERPT_CHARS)
            ),
        })
    }
}

/// Failure of a single attempt, before the retry decision.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("timed out: {detail}")]
    Timeout { detail: String },

    #[error("HTTP 401: {body}")]
    Unauthorized { body: String },

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {detail}")]
    Request { detail: String },

    #[error("{detail}")]
    Unexpected { detail: String },
}

impl AttemptError {
    fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AttemptError::Timeout {
                detail: e.to_string(),
            }
        } else {
            AttemptError::Request {
                detail: e.to_string(),
            }
        }
    }

    /// The caller-facing error for a failure on attempt `attempts`.
    fn exhausted(self, attempts: u32) -> ExtractError {
        match self {
            AttemptError::Timeout { detail } => ExtractError::Timeout { attempts, detail },
            AttemptError::Unauthorized { body } => ExtractError::Auth { detail: body },
            AttemptError::Status { status, body } => ExtractError::Http {
                attempts,
                status,
                body,
            },
            AttemptError::Request { detail } => ExtractError::Request { attempts, detail },
            AttemptError::Unexpected { detail } => ExtractError::Unexpected { attempts, detail },
        }
    }
}

/// First `max` characters of `s`, with an ellipsis when cut.
pub(crate) fn excerpt(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("short", 10), "short");
        assert_eq!(excerpt("abcdef", 3), "abc\u{2026}");
        assert_eq!(excerpt("가나다라", 2), "가나\u{2026}");
    }

    #[test]
    fn exhausted_maps_each_failure() {
        let e = AttemptError::Status {
            status: 503,
            body: "busy".into(),
        }
        .exhausted(3);
        assert!(matches!(e, ExtractError::Http { attempts: 3, status: 503, .. }));

        let e = AttemptError::Timeout { detail: "t".into() }.exhausted(2);
        assert!(matches!(e, ExtractError::Timeout { attempts: 2, .. }));

        let e = AttemptError::Request { detail: "dns".into() }.exhausted(1);
        assert!(matches!(e, ExtractError::Request { attempts: 1, .. }));

        let e = AttemptError::Unexpected { detail: "not json".into() }.exhausted(3);
        assert!(matches!(e, ExtractError::Unexpected { attempts: 3, .. }));
    }

    #[test]
    fn debug_redacts_key() {
        let c = EndpointClient::new("https://e.example.com", "hf_secret").unwrap();
        assert!(!format!("{c:?}").contains("hf_secret"));
    }
}
