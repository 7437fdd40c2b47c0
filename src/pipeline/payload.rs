//! Payload construction for the extraction endpoint.
//!
//! The wire body is:
//!
//! ```json
//! {"inputs": "<base64 or URL>",
//!  "parameters": {"schema": [{"key": "...", "description": "...", "type": "String", "is_array": false}]}}
//! ```
//!
//! Normalisation only trims and renames; it never drops or validates fields.
//! Run [`crate::schema::validate_schema`] first if empty keys must be refused.

use crate::schema::{DataType, SchemaField};
use serde::{Deserialize, Serialize};

/// One schema entry as the endpoint expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadField {
    pub key: String,
    pub description: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub is_array: bool,
}

impl From<&SchemaField> for PayloadField {
    fn from(field: &SchemaField) -> Self {
        Self {
            key: field.key_name.trim().to_string(),
            description: field.description.clone(),
            data_type: field.data_type,
            is_array: field.is_array,
        }
    }
}

/// Request object for one extraction call. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "inputs")]
    pub image: String,
    pub parameters: PayloadParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadParameters {
    pub schema: Vec<PayloadField>,
}

impl Payload {
    pub fn schema(&self) -> &[PayloadField] {
        &self.parameters.schema
    }
}

/// Build the extraction payload from an encoded image and the caller's schema.
///
/// Output order and length match `schema_fields`.
pub fn build_payload(image_data: impl Into<String>, schema_fields: &[SchemaField]) -> Payload {
    Payload {
        image: image_data.into(),
        parameters: PayloadParameters {
            schema: schema_fields.iter().map(PayloadField::from).collect(),
        },
    }
}
