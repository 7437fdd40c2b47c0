//! High-level entry points: extraction, schema suggestion and image upload.
//!
//! These tie the [`crate::pipeline`] stages together for the common case of
//! "one document, one call". Each stage is public too, for callers that need
//! a different composition.

use crate::config::ExtractionConfig;
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ExtractionStats, SuggestedSchema};
use crate::pipeline::encode::{chat_image_url, payload_image, to_data_uri};
use crate::pipeline::endpoint::EndpointClient;
use crate::pipeline::input::{self, ImageInput};
use crate::pipeline::parse::ResponseParser;
use crate::pipeline::payload::build_payload;
use crate::pipeline::relay::ImageRelay;
use crate::pipeline::suggest::{suggest_schema, SuggestOptions};
use crate::schema::{validate_schema, SchemaField};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract `schema` fields from a document image.
///
/// # Arguments
/// * `input` — local file path or HTTP/HTTPS URL of the image
/// * `schema` — fields to extract, in order
/// * `config` — endpoint, credentials and retry settings
///
/// # Errors
/// Schema and credential problems are reported before any request is sent.
/// Transport errors are returned once the retry budget is spent, except
/// [`ExtractError::Auth`], which is returned on the first 401.
pub async fn extract(
    input: impl AsRef<str>,
    schema: &[SchemaField],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let input = input.as_ref();
    info!("Starting extraction: {}", input);
    validate_schema(schema)?;
    let client = EndpointClient::from_config(config)?;
    let image = input::resolve_input(input).await?;
    run_extraction(&client, &image, schema, config).await
}

/// Extract from an image already held in memory or referenced by URL.
pub async fn extract_image(
    image: &ImageInput,
    schema: &[SchemaField],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    validate_schema(schema)?;
    let client = EndpointClient::from_config(config)?;
    run_extraction(&client, image, schema, config).await
}

async fn run_extraction(
    client: &EndpointClient,
    image: &ImageInput,
    schema: &[SchemaField],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let start = Instant::now();

    let payload = build_payload(payload_image(image), schema);
    debug!("Payload carries {} schema fields", payload.schema().len());

    let attempted = client
        .call_endpoint_counted(&payload, &config.extraction_policy())
        .await?;
    let (fields, strategy) = ResponseParser::default().parse_with_strategy(&attempted.value)?;

    let stats = ExtractionStats {
        attempts: attempted.attempts,
        strategy: strategy.to_string(),
        schema_fields: schema.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction complete: {} fields in {}ms ({} attempt(s))",
        fields.len(),
        stats.duration_ms,
        stats.attempts
    );

    Ok(ExtractionOutput { fields, stats })
}

/// Run an extraction and write the fields as pretty JSON to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input: impl AsRef<str>,
    schema: &[SchemaField],
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(input, schema, config).await?;
    let path = output_path.as_ref();
    let write_err = |e| ExtractError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let json = serde_json::to_string_pretty(&output.fields)
        .map_err(|e| ExtractError::Internal(format!("Failed to serialise result: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<str>,
    schema: &[SchemaField],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, schema, config))
}

/// Ask the chat endpoint to propose a schema for a document image.
///
/// Local images are published through the image relay when a hosting key is
/// configured, and sent inline as a `data:` URI otherwise. Never fails:
/// every problem is reported as [`SuggestedSchema::Failed`].
pub async fn suggest(input: impl AsRef<str>, config: &ExtractionConfig) -> SuggestedSchema {
    match input::resolve_input(input.as_ref()).await {
        Ok(image) => suggest_image(&image, config, true).await,
        Err(e) => {
            warn!("Cannot read suggestion input: {}", e);
            SuggestedSchema::failed(e.user_message(), e.to_string())
        }
    }
}

/// [`suggest`] for an already-resolved image. `use_relay = false` always
/// sends local bytes inline.
pub async fn suggest_image(image: &ImageInput, config: &ExtractionConfig, use_relay: bool) -> SuggestedSchema {
    let client = match EndpointClient::from_config(config) {
        Ok(c) => c,
        Err(e) => {
            warn!("Schema suggestion not configured: {}", e);
            return SuggestedSchema::failed(e.user_message(), e.to_string());
        }
    };

    let image_url = match image {
        ImageInput::Bytes { bytes, filename } if use_relay => {
            let relay = ImageRelay::from_config(config);
            match relay.upload_image(bytes, filename).await {
                Some(url) => url,
                None => {
                    debug!("Relay unavailable; sending image inline");
                    to_data_uri(bytes)
                }
            }
        }
        other => chat_image_url(other),
    };

    suggest_schema(&client, &image_url, &SuggestOptions::from_config(config)).await
}

/// Publish a document image on the configured image host.
///
/// URL inputs are downloaded first. Returns `Ok(None)` when the relay is
/// disabled or the host rejected the upload.
pub async fn upload(input: impl AsRef<str>, config: &ExtractionConfig) -> Result<Option<String>, ExtractError> {
    let image = input::resolve_input(input.as_ref()).await?;
    let image = input::fetch_bytes(image, config.download_timeout_secs).await?;
    let relay = ImageRelay::from_config(config);
    match &image {
        ImageInput::Bytes { bytes, filename } => Ok(relay.upload_image(bytes, filename).await),
        ImageInput::Url(_) => Err(ExtractError::Internal("download produced no bytes".into())),
    }
}
