//! Error types for the edgequake-extract library.
//!
//! [`ExtractError`] is the single fatal error type. Its variants fall into
//! three groups that callers treat differently:
//!
//! * **Setup** — [`ExtractError::Credential`], [`ExtractError::Config`]:
//!   nothing was sent; fix the environment and try again.
//! * **Transport** — [`ExtractError::Timeout`], [`ExtractError::Http`],
//!   [`ExtractError::Request`], [`ExtractError::Unexpected`]: returned only
//!   after the retry budget is spent. [`ExtractError::Auth`] is the exception
//!   and is returned on the first 401.
//! * **Data** — [`ExtractError::Parse`]: a response arrived but holds nothing
//!   usable. Never retried.
//!
//! The `Display` text is the diagnostic message. For the short, user-facing
//! wording use [`ExtractError::kind`] and [`ErrorKind::user_message`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-extract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Setup errors ──────────────────────────────────────────────────────
    /// No API key in the secret store or the environment.
    #[error("API key not found.\n{hint}")]
    Credential { hint: String },

    /// Endpoint URL is missing, still the placeholder, or the builder rejected a value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Transport errors ──────────────────────────────────────────────────
    /// The endpoint answered 401. Retrying with the same key cannot help.
    #[error("API authentication error (401): {detail}")]
    Auth { detail: String },

    /// Every attempt timed out.
    #[error("API call timed out after {attempts} attempts: {detail}")]
    Timeout { attempts: u32, detail: String },

    /// Every attempt returned a non-2xx status (other than 401).
    #[error("API HTTP error after {attempts} attempts: {status} - {body}")]
    Http {
        attempts: u32,
        status: u16,
        body: String,
    },

    /// Every attempt failed below HTTP (DNS, connect, TLS, broken body).
    #[error("API request error after {attempts} attempts: {detail}")]
    Request { attempts: u32, detail: String },

    /// Every attempt failed in some other way, e.g. a 2xx body that is not JSON.
    #[error("Unexpected error during API call after {attempts} attempts: {detail}")]
    Unexpected { attempts: u32, detail: String },

    // ── Data errors ───────────────────────────────────────────────────────
    /// The response held no extractable data, or carried an `error` member.
    #[error("Failed to parse extraction response: {detail}")]
    Parse { detail: String },

    /// Caller-side schema validation failed.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    // ── Input / output errors ─────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Downloading a URL input failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`ExtractError`], used for user-facing messages
/// and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Credential,
    Config,
    Auth,
    Timeout,
    Http,
    Request,
    Unexpected,
    Parse,
    Input,
    Output,
    Internal,
}

impl ErrorKind {
    /// Short message suitable for showing to an end user.
    ///
    /// Full detail belongs in logs; this text deliberately omits it.
    pub fn user_message(self) -> &'static str {
        match self {
            ErrorKind::Credential => "API key is not configured. Set HUGGINGFACE_API_KEY or add it to the secrets file.",
            ErrorKind::Config => "Endpoint is not configured. Set HUGGINGFACE_API_ENDPOINT_URL.",
            ErrorKind::Auth => "Authentication failed. Check your API key.",
            ErrorKind::Timeout => "The extraction service did not respond in time. Please try again.",
            ErrorKind::Http => "The extraction service returned an error. Please try again later.",
            ErrorKind::Request => "Could not reach the extraction service. Check your network connection.",
            ErrorKind::Unexpected => "The extraction service returned an unreadable response.",
            ErrorKind::Parse => "No extractable data was found in the service response.",
            ErrorKind::Input => "The input document could not be read.",
            ErrorKind::Output => "The result could not be written.",
            ErrorKind::Internal => "An internal error occurred.",
        }
    }

    /// Whether the retry loop may try again after an error of this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout | ErrorKind::Http | ErrorKind::Request | ErrorKind::Unexpected
        )
    }
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Credential { .. } => ErrorKind::Credential,
            ExtractError::Config(_) => ErrorKind::Config,
            ExtractError::Auth { .. } => ErrorKind::Auth,
            ExtractError::Timeout { .. } => ErrorKind::Timeout,
            ExtractError::Http { .. } => ErrorKind::Http,
            ExtractError::Request { .. } => ErrorKind::Request,
            ExtractError::Unexpected { .. } => ErrorKind::Unexpected,
            ExtractError::Parse { .. } => ErrorKind::Parse,
            ExtractError::InvalidSchema(_)
            | ExtractError::InputNotFound { .. }
            | ExtractError::InputReadFailed { .. }
            | ExtractError::DownloadFailed { .. } => ErrorKind::Input,
            ExtractError::OutputWriteFailed { .. } => ErrorKind::Output,
            ExtractError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for `self.kind().user_message()`.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_display_carries_status_and_attempts() {
        let e = ExtractError::Http {
            attempts: 3,
            status: 500,
            body: "Server Error".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("after 3 attempts"), "got: {msg}");
        assert!(msg.contains("500 - Server Error"), "got: {msg}");
    }

    #[test]
    fn timeout_display() {
        let e = ExtractError::Timeout {
            attempts: 3,
            detail: "operation timed out".into(),
        };
        assert!(e.to_string().contains("timed out after 3 attempts"));
    }

    #[test]
    fn auth_error_display() {
        let e = ExtractError::Auth {
            detail: "Unauthorized".into(),
        };
        assert!(e.to_string().contains("(401)"));
        assert!(e.to_string().contains("Unauthorized"));
    }

    #[test]
    fn kinds_map_to_distinct_user_messages() {
        let auth = ExtractError::Auth { detail: String::new() };
        let parse = ExtractError::Parse { detail: String::new() };
        assert_eq!(auth.kind(), ErrorKind::Auth);
        assert_eq!(parse.kind(), ErrorKind::Parse);
        assert_ne!(auth.user_message(), parse.user_message());
        assert!(!auth.user_message().contains('\n'));
    }

    #[test]
    fn only_transport_kinds_are_retryable() {
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::Http.is_retryable());
        assert!(ErrorKind::Request.is_retryable());
        assert!(ErrorKind::Unexpected.is_retryable());
        assert!(!ErrorKind::Auth.is_retryable());
        assert!(!ErrorKind::Parse.is_retryable());
        assert!(!ErrorKind::Credential.is_retryable());
    }
}
