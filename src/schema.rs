//! Extraction schema: the fields a caller wants pulled out of a document.
//!
//! A schema is an ordered `Vec<SchemaField>`. The API layer only ever reads
//! it (`&[SchemaField]`); editing and validation happen on the caller side
//! before extraction starts.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Value type the model should produce for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    #[default]
    String,
    Number,
    Date,
    Boolean,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::String => "String",
            DataType::Number => "Number",
            DataType::Date => "Date",
            DataType::Boolean => "Boolean",
        }
    }

    /// Parse a type name coming from model output; unknown names become `String`.
    pub fn from_lenient(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for DataType {
    type Error = ExtractError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DataType> for String {
    fn from(t: DataType) -> Self {
        t.as_str().to_string()
    }
}

impl FromStr for DataType {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Ok(DataType::String),
            "number" | "int" | "integer" | "float" => Ok(DataType::Number),
            "date" => Ok(DataType::Date),
            "boolean" | "bool" => Ok(DataType::Boolean),
            other => Err(ExtractError::InvalidSchema(format!(
                "unknown data type '{other}' (expected String, Number, Date or Boolean)"
            ))),
        }
    }
}

/// One value to extract from a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub key_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_type: DataType,
    #[serde(default)]
    pub is_array: bool,
}

impl SchemaField {
    pub fn new(key_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            key_name: key_name.into(),
            description: String::new(),
            data_type,
            is_array: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn array(mut self, is_array: bool) -> Self {
        self.is_array = is_array;
        self
    }

    /// Read a field from a loosely-shaped JSON object produced by a model.
    ///
    /// Missing members take their defaults; `key` and `type` are accepted as
    /// aliases for `key_name` and `data_type`. Returns `None` for non-objects.
    pub fn from_value_lenient(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let text = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| obj.get(*n))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .unwrap_or_default()
        };

        let is_array = match obj.get("is_array") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            _ => false,
        };

        Some(Self {
            key_name: text(&["key_name", "key"]),
            description: text(&["description"]),
            data_type: DataType::from_lenient(&text(&["data_type", "type"])),
            is_array,
        })
    }
}

/// Check the schema invariants: every key name non-empty after trimming,
/// and unique within the schema.
pub fn validate_schema(fields: &[SchemaField]) -> Result<(), ExtractError> {
    if fields.is_empty() {
        return Err(ExtractError::InvalidSchema(
            "schema has no fields".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let key = field.key_name.trim();
        if key.is_empty() {
            return Err(ExtractError::InvalidSchema(format!(
                "field #{} has an empty key name",
                i + 1
            )));
        }
        if !seen.insert(key) {
            return Err(ExtractError::InvalidSchema(format!(
                "duplicate key name '{key}'"
            )));
        }
    }
    Ok(())
}

/// Load a schema from a JSON file containing an array of fields.
pub fn load_schema(path: impl AsRef<Path>) -> Result<Vec<SchemaField>, ExtractError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    serde_json::from_str(&content).map_err(|e| {
        ExtractError::InvalidSchema(format!("{}: {}", path.display(), e))
    })
}
