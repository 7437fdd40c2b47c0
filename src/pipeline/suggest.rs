//! Schema suggestion through an OpenAI-compatible chat-completions endpoint.
//!
//! The model sees the document image plus [`SCHEMA_SUGGESTION_PROMPT`] and is
//! asked for a bare JSON list of schema fields. Its reply goes through the
//! [`crate::pipeline::repair`] pipeline before being read into
//! [`SchemaField`]s.
//!
//! Nothing here returns `Err`: transport failures, odd response shapes and
//! unparseable text all become [`SuggestedSchema::Failed`].

use crate::config::{ExtractionConfig, RetryPolicy};
use crate::pipeline::endpoint::{excerpt, EndpointClient};
use crate::pipeline::repair::{JsonRepairPipeline, RAW_EXCERPT_CHARS};
use crate::output::SuggestedSchema;
use crate::prompts::SCHEMA_SUGGESTION_PROMPT;
use crate::schema::SchemaField;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

const CHAT_COMPLETIONS_SUFFIX: &str = "/v1/chat/completions";

/// Turn an endpoint base URL into its chat-completions URL.
///
/// `…/v1/chat/completions` is kept as-is, `…/v1` gets `/chat/completions`,
/// anything else gets the full suffix. Trailing slashes are ignored.
pub fn chat_completions_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with(CHAT_COMPLETIONS_SUFFIX) {
        base.to_string()
    } else if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}{CHAT_COMPLETIONS_SUFFIX}")
    }
}

/// Knobs for one suggestion call.
#[derive(Debug, Clone)]
pub struct SuggestOptions {
    pub policy: RetryPolicy,
    pub max_tokens: usize,
    pub model: Option<String>,
}

impl SuggestOptions {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            policy: config.suggestion_policy(),
            max_tokens: config.suggest_max_tokens,
            model: config.suggest_model.clone(),
        }
    }
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self::from_config(&ExtractionConfig::default())
    }
}

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    ImageUrl { image_url: ImageUrl<'a> },
    Text { text: &'a str },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

fn build_request<'a>(image_url: &'a str, options: &'a SuggestOptions) -> ChatRequest<'a> {
    ChatRequest {
        model: options.model.as_deref(),
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url },
                },
                ContentPart::Text {
                    text: SCHEMA_SUGGESTION_PROMPT,
                },
            ],
        }],
        max_tokens: options.max_tokens,
        stream: false,
    }
}

/// Ask the model behind `client` to propose a schema for the image at
/// `image_url` (a public URL or a `data:` URI).
pub async fn suggest_schema(
    client: &EndpointClient,
    image_url: &str,
    options: &SuggestOptions,
) -> SuggestedSchema {
    let url = chat_completions_url(client.endpoint_url());
    info!("Requesting schema suggestion from {}", url);

    let request = build_request(image_url, options);
    let response = match client.post_json_with_retry(&url, &request, &options.policy).await {
        Ok(attempted) => attempted.value,
        Err(e) => {
            warn!("Schema suggestion request failed: {}", e);
            return SuggestedSchema::failed(e.user_message(), e.to_string());
        }
    };

    let Some(content) = message_content(&response) else {
        warn!("Chat response has no choices[0].message.content");
        return SuggestedSchema::failed(
            "Unexpected response format from the suggestion endpoint",
            excerpt(&response.to_string(), RAW_EXCERPT_CHARS),
        );
    };
    debug!("Suggestion reply: {} chars", content.len());

    schema_from_text(content)
}

/// Repair model text and read it into schema fields.
pub fn schema_from_text(text: &str) -> SuggestedSchema {
    let items = match JsonRepairPipeline::default().repair(text) {
        Ok(items) => items,
        Err(failure) => {
            warn!("Could not recover a JSON list from the model reply");
            return SuggestedSchema::failed("Model output was not a JSON list", failure.excerpt);
        }
    };

    let fields: Vec<SchemaField> = items
        .iter()
        .filter_map(|item| {
            let field = SchemaField::from_value_lenient(item);
            if field.is_none() {
                warn!("Dropping suggested element that is not a field object: {}", item);
            }
            field
        })
        .collect();

    info!("Model suggested {} fields", fields.len());
    SuggestedSchema::Fields(fields)
}

fn message_content(response: &Value) -> Option<&str> {
    response
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
}
