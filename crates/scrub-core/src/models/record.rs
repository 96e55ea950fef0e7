//! Extracted record model.

use std::fmt;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

/// A coerced field value. Absence is modeled as `Option::None` by the holder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Non-numeric capture, trimmed.
    Text(String),
    /// Capture that passed numeric detection.
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }
}

/// Canonical textual form: strings verbatim, numbers in shortest round-trip
/// decimal notation (`88.5`, `37`, `0.5`), never exponent form.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// One named slot of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedField {
    /// Field name from the rule set.
    pub name: String,
    /// Extracted value, `None` if the pattern did not match.
    pub value: Option<FieldValue>,
}

/// Fields extracted from one successfully processed document.
///
/// The field set always equals the rule set it was extracted with, in rule order;
/// unmatched fields are present with a `None` value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    /// Name of the source document.
    pub source: String,

    /// Fields in rule order.
    #[serde(serialize_with = "serialize_fields")]
    pub fields: Vec<ExtractedField>,
}

impl ExtractedRecord {
    pub fn new(source: impl Into<String>, fields: Vec<ExtractedField>) -> Self {
        Self {
            source: source.into(),
            fields,
        }
    }

    /// Value of a field, `None` if absent or not part of the schema.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .and_then(|f| f.value.as_ref())
    }

    /// Whether the schema of this record includes `name`.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Field names in rule order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Number of fields whose pattern matched.
    pub fn matched_count(&self) -> usize {
        self.fields.iter().filter(|f| f.value.is_some()).count()
    }
}

fn serialize_fields<S>(fields: &[ExtractedField], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for field in fields {
        map.serialize_entry(&field.name, &field.value)?;
    }
    map.end()
}
