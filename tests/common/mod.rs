//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_extract::{ExtractionConfig, RetryPolicy};
use std::sync::Once;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 1×1 transparent PNG.
pub const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

pub const TEST_KEY: &str = "hf_test_key";

/// Initializes the tracing subscriber once per test binary.
pub fn setup_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .init();
    });
}

/// Base URL of a local port with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

pub fn png_bytes() -> Vec<u8> {
    STANDARD.decode(PNG_B64).expect("valid base64")
}

/// Three attempts, 1 s timeout and a 1 ms backoff base so retry tests stay fast.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        timeout: Duration::from_secs(1),
        backoff_base: Duration::from_millis(1),
    }
}

/// Config pointing at `endpoint_url` with an explicit key and fast retries.
pub fn fast_config(endpoint_url: &str) -> ExtractionConfig {
    ExtractionConfig::builder()
        .endpoint_url(endpoint_url)
        .api_key(TEST_KEY)
        .secrets_path("/nonexistent/secrets.toml")
        .retry_backoff_ms(1)
        .api_timeout_secs(1)
        .suggest_timeout_secs(1)
        .build()
        .expect("valid test config")
}
