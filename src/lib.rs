//! # edgequake-extract
//!
//! Pull structured fields out of document images using a hosted
//! vision-language model.
//!
//! ## Why this crate?
//!
//! Template-based OCR breaks as soon as a vendor moves a box on its invoice.
//! Here the caller describes *what* it wants (a list of named, typed fields)
//! and a remote model reads the image the way a person would. The crate
//! handles everything around that call: credentials, payload shape, retries,
//! the many response shapes endpoints produce, and the cleanup of
//! model-written JSON.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path / URL)
//!  │
//!  ├─ 1. Input     read local bytes or keep the URL
//!  ├─ 2. Encode    base64 (or data: URI for chat requests)
//!  ├─ 3. Payload   {"inputs", "parameters": {"schema": [...]}}
//!  ├─ 4. Endpoint  bearer-authenticated POST, 3 attempts, 1s → 2s backoff
//!  └─ 5. Parse     ordered strategies locate the field mapping
//! ```
//!
//! Schema suggestion swaps steps 3–5 for a chat-completions request and a
//! JSON-repair pass, optionally relaying the image through an image host.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_extract::{extract, DataType, ExtractionConfig, SchemaField};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key and endpoint from HUGGINGFACE_API_KEY / HUGGINGFACE_API_ENDPOINT_URL
//!     let config = ExtractionConfig::default();
//!     let schema = vec![
//!         SchemaField::new("InvoiceNumber", DataType::String),
//!         SchemaField::new("Total", DataType::Number).description("Grand total"),
//!     ];
//!     let output = extract("invoice.png", &schema, &config).await?;
//!     println!("{}", serde_json::to_string_pretty(&output.fields)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc-extract` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-extract = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod schema;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, RetryPolicy};
pub use credentials::{CredentialResolver, SecretStore};
pub use error::{ErrorKind, ExtractError};
pub use extract::{extract, extract_image, extract_sync, extract_to_file, suggest, suggest_image, upload};
pub use output::{ExtractionOutput, ExtractionResult, ExtractionStats, SuggestedSchema, SuggestionFailure};
pub use pipeline::endpoint::EndpointClient;
pub use pipeline::input::ImageInput;
pub use pipeline::parse::{parse_response, ExtractionStrategy, ResponseParser};
pub use pipeline::payload::{build_payload, Payload};
pub use pipeline::relay::ImageRelay;
pub use pipeline::repair::JsonRepairPipeline;
pub use pipeline::suggest::{suggest_schema, SuggestOptions};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use schema::{load_schema, validate_schema, DataType, SchemaField};
