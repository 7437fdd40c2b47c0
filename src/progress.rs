//! Progress-callback trait for endpoint attempt events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to hear about
//! each attempt, each failed attempt and each backoff as the retry loop runs.
//! The CLI uses it to drive a spinner; a UI would use it to show
//! "calling the API (attempt 2/3)".
//!
//! # Example
//!
//! ```rust
//! use edgequake_extract::{ExtractionProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct AttemptCounter {
//!     attempts: AtomicU32,
//! }
//!
//! impl ExtractionProgressCallback for AttemptCounter {
//!     fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
//!         self.attempts.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("attempt {attempt}/{max_attempts}");
//!     }
//! }
//!
//! let counter = Arc::new(AttemptCounter { attempts: AtomicU32::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the retry loop as it talks to an endpoint.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Attempt numbers are 1-indexed.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called just before a request is sent.
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// Called when an attempt fails, whether or not another one follows.
    fn on_attempt_failed(&self, attempt: u32, max_attempts: u32, error: &str) {
        let _ = (attempt, max_attempts, error);
    }

    /// Called before sleeping ahead of the next attempt.
    fn on_backoff(&self, next_attempt: u32, delay: Duration) {
        let _ = (next_attempt, delay);
    }

    /// Called once when a 2xx response with a JSON body arrives.
    fn on_success(&self, attempt: u32) {
        let _ = attempt;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
