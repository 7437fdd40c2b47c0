//! Prompts sent to the chat-completions endpoint.
//!
//! Kept in one place so tests can inspect them and so the wording can change
//! without touching the request or repair code.

/// Instruction paired with the document image when asking the model to
/// propose an extraction schema.
///
/// The reply is expected to be a bare JSON list; the repair pipeline in
/// [`crate::pipeline::repair`] copes with the usual deviations.
pub const SCHEMA_SUGGESTION_PROMPT: &str = r#"You are a document analysis assistant. Look at this document image and identify the key pieces of information a user would want to extract from it (for example invoice number, dates, totals, names, addresses, line items).

Return ONLY a JSON list. Each element must be an object with exactly these keys:
- "key_name": a short field name in PascalCase, without spaces
- "description": one sentence describing the value
- "data_type": one of "String", "Number", "Date", "Boolean"
- "is_array": true if the field can hold several values, otherwise false

Do NOT wrap the list in code fences.
Do NOT add commentary or explanations.
Start your answer with [ and end it with ]."#;

/// Marker substring that identifies a raw text reply inside a list response.
pub const RAW_TEXT_MARKER: &str = "generated_text";
