//! Response parsing: locate the extracted fields in a loosely-shaped body.
//!
//! Inference endpoints wrap their output in a handful of shapes, and some
//! report errors inside a 200 body. [`ResponseParser`] walks an ordered list
//! of [`ExtractionStrategy`] values; the first one that matches decides the
//! outcome. The default order is:
//!
//! 1. `[{"error": ...}]`            → error (with `estimated_time` if present)
//! 2. `{"error": ...}`              → error (after logging any `warnings`)
//! 3. `[{...}, ...]`                → first element; `["...generated_text..."]` → `{"raw_text_output": ...}`
//! 4. `{"extracted_data" | "outputs" | "predictions" | "results": ...}` → that member
//! 5. `{...}` (non-empty)           → the whole object
//! 6. anything else                 → "no extractable data"
//!
//! The order is a heuristic built from observed provider behaviour. Changing
//! it changes what ambiguous responses produce, so build a custom parser with
//! [`ResponseParser::new`] rather than editing the default.

use crate::error::ExtractError;
use crate::output::ExtractionResult;
use crate::prompts::RAW_TEXT_MARKER;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Candidate wrapper keys, in lookup order.
pub const DEFAULT_CANDIDATE_KEYS: &[&str] = &["extracted_data", "outputs", "predictions", "results"];

/// One way of finding the result inside a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Non-empty list whose first element is an object with an `error` key.
    ListError,
    /// Object with an `error` key.
    ObjectError,
    /// First element of a non-empty list (object, or marker-bearing string).
    FirstListElement { raw_text_marker: String },
    /// First present key whose value is an object or a list starting with one.
    CandidateKeys(Vec<String>),
    /// Any non-empty object, returned unchanged.
    WholeObject,
}

impl ExtractionStrategy {
    /// Short name used in logs and [`crate::output::ExtractionStats`].
    pub fn name(&self) -> &'static str {
        match self {
            ExtractionStrategy::ListError => "list_error",
            ExtractionStrategy::ObjectError => "object_error",
            ExtractionStrategy::FirstListElement { .. } => "first_list_element",
            ExtractionStrategy::CandidateKeys(_) => "candidate_keys",
            ExtractionStrategy::WholeObject => "whole_object",
        }
    }

    /// `None` means "does not apply, try the next strategy".
    fn apply(&self, response: &Value) -> Option<Result<ExtractionResult, ExtractError>> {
        match self {
            ExtractionStrategy::ListError => {
                let first = response.as_array()?.first()?.as_object()?;
                let detail = first.get("error")?;
                let mut msg = format!("API error in response list: {}", describe(detail));
                if let Some(eta) = first.get("estimated_time") {
                    msg.push_str(&format!(" (estimated time: {}s)", describe(eta)));
                }
                Some(Err(ExtractError::Parse { detail: msg }))
            }

            ExtractionStrategy::ObjectError => {
                let obj = response.as_object()?;
                let detail = obj.get("error")?;
                if let Some(warnings) = obj.get("warnings").filter(|w| is_truthy(w)) {
                    warn!("API response warnings: {}", describe(warnings));
                }
                Some(Err(ExtractError::Parse {
                    detail: format!("API error: {}", describe(detail)),
                }))
            }

            ExtractionStrategy::FirstListElement { raw_text_marker } => {
                match response.as_array()?.first()? {
                    Value::Object(obj) => Some(Ok(obj.clone())),
                    Value::String(s) if s.contains(raw_text_marker.as_str()) => {
                        debug!("List element is raw model text; wrapping it");
                        let mut out = Map::new();
                        out.insert("raw_text_output".to_string(), Value::String(s.clone()));
                        Some(Ok(out))
                    }
                    other => {
                        warn!("First list element is not an object: {}", type_name(other));
                        None
                    }
                }
            }

            ExtractionStrategy::CandidateKeys(keys) => {
                let obj = response.as_object()?;
                keys.iter().find_map(|key| match obj.get(key)? {
                    Value::Array(items) => items
                        .first()
                        .and_then(Value::as_object)
                        .map(|first| Ok(first.clone())),
                    Value::Object(inner) => Some(Ok(inner.clone())),
                    _ => None,
                })
            }

            ExtractionStrategy::WholeObject => {
                let obj = response.as_object()?;
                (!obj.is_empty()).then(|| Ok(obj.clone()))
            }
        }
    }
}

/// Ordered list of strategies; first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseParser {
    strategies: Vec<ExtractionStrategy>,
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new(vec![
            ExtractionStrategy::ListError,
            ExtractionStrategy::ObjectError,
            ExtractionStrategy::FirstListElement {
                raw_text_marker: RAW_TEXT_MARKER.to_string(),
            },
            ExtractionStrategy::CandidateKeys(
                DEFAULT_CANDIDATE_KEYS.iter().map(|k| k.to_string()).collect(),
            ),
            ExtractionStrategy::WholeObject,
        ])
    }
}

impl ResponseParser {
    pub fn new(strategies: Vec<ExtractionStrategy>) -> Self {
        Self { strategies }
    }

    pub fn strategies(&self) -> &[ExtractionStrategy] {
        &self.strategies
    }

    /// Parse `response`, returning the result and the name of the strategy
    /// that produced it.
    pub fn parse_with_strategy(
        &self,
        response: &Value,
    ) -> Result<(ExtractionResult, &'static str), ExtractError> {
        for strategy in &self.strategies {
            if let Some(outcome) = strategy.apply(response) {
                let result = outcome?;
                debug!("Parsed response with strategy '{}'", strategy.name());
                return Ok((result, strategy.name()));
            }
        }

        warn!("No extractable data in response: {}", excerpt_value(response));
        Err(ExtractError::Parse {
            detail: "no extractable data found in API response".to_string(),
        })
    }

    pub fn parse(&self, response: &Value) -> Result<ExtractionResult, ExtractError> {
        self.parse_with_strategy(response).map(|(result, _)| result)
    }
}

/// Parse a response with the default strategy order.
pub fn parse_response(response: &Value) -> Result<ExtractionResult, ExtractError> {
    ResponseParser::default().parse(response)
}

fn describe(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn excerpt_value(v: &Value) -> String {
    crate::pipeline::endpoint::excerpt(&v.to_string(), 200)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> ExtractionResult {
        v.as_object().cloned().unwrap()
    }

    fn parse_err(v: Value) -> String {
        match parse_response(&v) {
            Err(ExtractError::Parse { detail }) => detail,
            other => panic!("expected parse error for {v}, got {other:?}"),
        }
    }

    #[test]
    fn list_with_object() {
        assert_eq!(
            parse_response(&json!([{"InvoiceNumber": "INV123"}])).unwrap(),
            obj(json!({"InvoiceNumber": "INV123"}))
        );
    }

    #[test]
    fn extracted_data_key() {
        assert_eq!(
            parse_response(&json!({"extracted_data": {"Item": "Widget"}})).unwrap(),
            obj(json!({"Item": "Widget"}))
        );
    }

    #[test]
    fn whole_object_fallback() {
        assert_eq!(
            parse_response(&json!({"Name": "John Doe"})).unwrap(),
            obj(json!({"Name": "John Doe"}))
        );
        assert_eq!(
            parse_response(&json!({"raw_text_output": "Some text"})).unwrap(),
            obj(json!({"raw_text_output": "Some text"}))
        );
    }

    #[test]
    fn object_error() {
        let detail = parse_err(json!({"error": "Model failed"}));
        assert!(detail.contains("Model failed"), "got: {detail}");
    }

    #[test]
    fn object_error_with_warnings_still_fails() {
        let detail = parse_err(json!({"error": "Model loading failed", "warnings": ["Deprecated field used"]}));
        assert!(detail.contains("Model loading failed"));
    }

    #[test]
    fn list_error_with_estimated_time() {
        let detail = parse_err(json!([{"error": "Input too long", "estimated_time": 10.5}]));
        assert!(detail.contains("Input too long"));
        assert!(detail.contains("10.5"));
    }

    #[test]
    fn empty_list_has_no_data() {
        let detail = parse_err(json!([]));
        assert!(detail.contains("no extractable data"), "got: {detail}");
    }

    #[test]
    fn empty_object_and_scalars_have_no_data() {
        parse_err(json!({}));
        parse_err(json!("just text"));
        parse_err(json!(null));
        parse_err(json!([42]));
    }

    #[test]
    fn generated_text_string_is_wrapped() {
        let raw = r#"{"generated_text": "Invoice INV1"}"#;
        assert_eq!(
            parse_response(&json!([raw])).unwrap(),
            obj(json!({"raw_text_output": raw}))
        );
    }

    #[test]
    fn list_string_without_marker_has_no_data() {
        parse_err(json!(["plain text"]));
    }

    #[test]
    fn candidate_keys_in_order() {
        let v = json!({"results": {"b": 2}, "outputs": [{"a": 1}, {"z": 9}]});
        assert_eq!(parse_response(&v).unwrap(), obj(json!({"a": 1})));
    }

    #[test]
    fn unusable_candidate_key_falls_through() {
        // `outputs` is a string, so the next key wins.
        let v = json!({"outputs": "n/a", "predictions": [{"p": true}]});
        assert_eq!(parse_response(&v).unwrap(), obj(json!({"p": true})));

        // No usable key at all: the whole object is returned.
        let v = json!({"outputs": []});
        assert_eq!(parse_response(&v).unwrap(), obj(json!({"outputs": []})));
    }

    #[test]
    fn error_beats_candidate_keys() {
        let detail = parse_err(json!({"error": "boom", "extracted_data": {"a": 1}}));
        assert!(detail.contains("boom"));
    }

    #[test]
    fn strategy_name_is_reported() {
        let parser = ResponseParser::default();
        let (_, name) = parser.parse_with_strategy(&json!({"results": [{"x": 1}]})).unwrap();
        assert_eq!(name, "candidate_keys");
        let (_, name) = parser.parse_with_strategy(&json!({"x": 1})).unwrap();
        assert_eq!(name, "whole_object");
    }

    #[test]
    fn custom_order_changes_precedence() {
        let parser = ResponseParser::new(vec![ExtractionStrategy::WholeObject]);
        let v = json!({"extracted_data": {"Item": "Widget"}});
        assert_eq!(parser.parse(&v).unwrap(), obj(v.clone()));
    }

    #[test]
    fn round_trip_through_json_text() {
        let shapes = vec![
            (json!([{"InvoiceNumber": "INV123", "Total": 100.5}]), json!({"InvoiceNumber": "INV123", "Total": 100.5})),
            (json!({"extracted_data": {"Item": "Widget", "Quantity": 5}}), json!({"Item": "Widget", "Quantity": 5})),
            (json!({"predictions": [{"Date": "2024-01-01"}]}), json!({"Date": "2024-01-01"})),
            (json!({"Name": "John Doe", "Email": "john.doe@example.com"}), json!({"Name": "John Doe", "Email": "john.doe@example.com"})),
            (
                json!([r#"{"generated_text": "Invoice INV123"}"#]),
                json!({"raw_text_output": r#"{"generated_text": "Invoice INV123"}"#}),
            ),
        ];
        for (shape, expected) in shapes {
            let decoded: Value = serde_json::from_str(&serde_json::to_string(&shape).unwrap()).unwrap();
            assert_eq!(parse_response(&decoded).unwrap(), obj(expected));
        }
    }
}
