//! Result types returned by the high-level entry points.

use crate::schema::SchemaField;
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Flat mapping from field name to extracted value.
pub type ExtractionResult = Map<String, Value>;

/// Output of [`crate::extract()`]: the extracted fields plus call statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub fields: ExtractionResult,
    pub stats: ExtractionStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Attempts the retry loop needed (1 = first try succeeded).
    pub attempts: u32,
    /// Name of the parser strategy that produced `fields`.
    pub strategy: String,
    /// Number of schema fields sent.
    pub schema_fields: usize,
    /// Wall-clock time including backoff sleeps.
    pub duration_ms: u64,
}

/// Why a schema suggestion failed. Serialises as `{"error", "details"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionFailure {
    pub error: String,
    pub details: String,
}

/// Outcome of a schema suggestion.
///
/// Serialises to a JSON list in both cases: the suggested fields, or a
/// single `{"error", "details"}` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestedSchema {
    Fields(Vec<SchemaField>),
    Failed(SuggestionFailure),
}

impl SuggestedSchema {
    pub fn failed(error: impl Into<String>, details: impl Into<String>) -> Self {
        SuggestedSchema::Failed(SuggestionFailure {
            error: error.into(),
            details: details.into(),
        })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SuggestedSchema::Failed(_))
    }

    /// The suggested fields, or `None` on failure.
    pub fn fields(&self) -> Option<&[SchemaField]> {
        match self {
            SuggestedSchema::Fields(f) => Some(f),
            SuggestedSchema::Failed(_) => None,
        }
    }
}

impl Serialize for SuggestedSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SuggestedSchema::Fields(fields) => fields.serialize(serializer),
            SuggestedSchema::Failed(failure) => {
                let mut seq = serializer.serialize_seq(Some(1))?;
                seq.serialize_element(failure)?;
                seq.end()
            }
        }
    }
}
