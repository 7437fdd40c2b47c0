//! JSON repair: salvage a schema list from free-form model output.
//!
//! Even when told to answer with a bare JSON list, chat models regularly
//! wrap it in ```` ```json ```` fences, double every brace (`{{ ... }}`, a
//! template-escaping habit of some instruction-tuned models), or surround it
//! with a sentence of commentary. None of that is valid JSON.
//!
//! The pipeline has two phases, each an ordered list of independent steps:
//!
//! 1. **Normalisers** (`&str → String`) clean the text:
//!    strip fences → collapse doubled braces → strip fences again.
//! 2. **Extractors** (`&str → Option<Vec<Value>>`) try to read a list out of
//!    the cleaned text; the first `Some` wins:
//!    direct parse → largest `[...]` or `{...}` span, longer span first.
//!
//! New model quirks are handled by adding a step, not by editing existing
//! ones. This is best-effort salvage, not a JSON grammar: a caller gets
//! either a list of JSON values or a [`RepairFailure`] with an excerpt of the
//! raw text.

use crate::pipeline::endpoint::excerpt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Characters of raw model output kept in a [`RepairFailure`].
pub const RAW_EXCERPT_CHARS: usize = 200;

/// A text-cleaning step.
pub type Normaliser = fn(&str) -> String;

/// A list-reading step; `None` means "no match".
pub type Extractor = fn(&str) -> Option<Vec<Value>>;

/// No extractor produced a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairFailure {
    /// Leading characters of the raw text, for diagnostics.
    pub excerpt: String,
}

/// Ordered normalisers followed by ordered extractors.
#[derive(Clone)]
pub struct JsonRepairPipeline {
    normalisers: Vec<(&'static str, Normaliser)>,
    extractors: Vec<(&'static str, Extractor)>,
}

impl Default for JsonRepairPipeline {
    fn default() -> Self {
        Self {
            normalisers: vec![
                ("strip_code_fences", strip_code_fences as Normaliser),
                ("collapse_doubled_braces", collapse_doubled_braces as Normaliser),
                ("strip_code_fences", strip_code_fences as Normaliser),
            ],
            extractors: vec![
                ("direct_list", parse_direct_list as Extractor),
                ("largest_span", rescue_largest_span as Extractor),
            ],
        }
    }
}

impl std::fmt::Debug for JsonRepairPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRepairPipeline")
            .field("normalisers", &self.normalisers.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .field("extractors", &self.extractors.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish()
    }
}

impl JsonRepairPipeline {
    /// Append a normaliser after the existing ones.
    pub fn with_normaliser(mut self, name: &'static str, step: Normaliser) -> Self {
        self.normalisers.push((name, step));
        self
    }

    /// Append an extractor after the existing ones.
    pub fn with_extractor(mut self, name: &'static str, step: Extractor) -> Self {
        self.extractors.push((name, step));
        self
    }

    /// Run every normaliser in order.
    pub fn normalise(&self, raw: &str) -> String {
        self.normalisers
            .iter()
            .fold(raw.to_string(), |text, (_, step)| step(&text))
    }

    /// Normalise `raw`, then return the first list an extractor finds.
    pub fn repair(&self, raw: &str) -> Result<Vec<Value>, RepairFailure> {
        let text = self.normalise(raw);
        for (name, step) in &self.extractors {
            if let Some(list) = step(&text) {
                debug!("JSON repair: '{}' produced {} elements", name, list.len());
                return Ok(list);
            }
        }
        Err(RepairFailure {
            excerpt: excerpt(raw, RAW_EXCERPT_CHARS),
        })
    }
}

/// Repair with the default pipeline.
pub fn repair_json_list(raw: &str) -> Result<Vec<Value>, RepairFailure> {
    JsonRepairPipeline::default().repair(raw)
}

// ── Normaliser: strip code fences ───────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").unwrap());
static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

/// Remove a leading ```` ```lang ```` line and a trailing ```` ``` ````,
/// independently, so truncated output that lost its closing fence is still
/// cleaned.
pub fn strip_code_fences(input: &str) -> String {
    let s = input.trim();
    let s = RE_LEADING_FENCE.replace(s, "");
    let s = RE_TRAILING_FENCE.replace(&s, "");
    s.trim().to_string()
}

// ── Normaliser: collapse doubled braces ─────────────────────────────────────

/// `{{` → `{` and `}}` → `}` across the whole text.
pub fn collapse_doubled_braces(input: &str) -> String {
    input.replace("{{", "{").replace("}}", "}")
}

// ── Extractor: direct parse ─────────────────────────────────────────────────

/// The text is already a JSON list.
pub fn parse_direct_list(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text).ok()? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

// ── Extractors: span rescue ─────────────────────────────────────────────────

static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\[.*\]").unwrap());
static RE_BRACED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Parse the largest delimited span: whichever of first-`[`-to-last-`]`
/// and first-`{`-to-last-`}` is longer is tried first, the other second.
///
/// An object holding an array value (`{"key_name": .., "examples": [..]}`)
/// must not be read as its inner array.
pub fn rescue_largest_span(text: &str) -> Option<Vec<Value>> {
    let mut spans: Vec<&str> = [&*RE_BRACKETED, &*RE_BRACED]
        .into_iter()
        .filter_map(|re| re.find(text).map(|m| m.as_str()))
        .collect();
    spans.sort_by_key(|span| std::cmp::Reverse(span.len()));
    spans.into_iter().find_map(parse_span)
}

fn parse_span(span: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(span).ok()? {
        Value::Array(items) => Some(items),
        Value::Object(obj) if !obj.is_empty() => Some(vec![Value::Object(obj)]),
        _ => None,
    }
}
