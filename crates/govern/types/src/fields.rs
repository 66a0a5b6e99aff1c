//! Field-mapping parsing shared by the typed payloads.
//!
//! Callers hand the engine loosely typed mappings (form submissions, parsed
//! upload rows). Each payload type reads them through a bounded schema: keys it
//! owns are parsed, keys it deliberately ignores are dropped, and anything else
//! is rejected.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

/// Loosely typed mapping of field name to scalar value.
pub type FieldMap = serde_json::Map<String, Value>;

/// Errors raised while reading a field mapping into a typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("invalid role `{0}`")]
    InvalidRole(String),

    #[error("invalid status `{0}`")]
    InvalidStatus(String),

    #[error("invalid payload: {0}")]
    Invalid(String),

    #[error("stored payload could not be decoded: {0}")]
    Undecodable(String),
}

/// Reject every key that is neither owned nor explicitly ignored.
pub(crate) fn check_keys(
    fields: &FieldMap,
    owned: &[&str],
    ignored: &[&str],
) -> Result<(), PayloadError> {
    match fields
        .keys()
        .find(|key| !owned.contains(&key.as_str()) && !ignored.contains(&key.as_str()))
    {
        Some(key) => Err(PayloadError::UnknownField(key.clone())),
        None => Ok(()),
    }
}

/// Read a scalar as text. Numbers and booleans are rendered, since spreadsheet
/// rows routinely carry codes like `840` as numbers.
fn scalar_text(field: &str, value: &Value) -> Result<Option<String>, PayloadError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(PayloadError::InvalidType {
            field: field.to_string(),
            expected: "a scalar value",
        }),
    }
}

pub(crate) fn required_text(fields: &FieldMap, key: &'static str) -> Result<String, PayloadError> {
    match fields.get(key) {
        Some(value) => match scalar_text(key, value)? {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(PayloadError::MissingField(key)),
        },
        None => Err(PayloadError::MissingField(key)),
    }
}

/// Missing and null both read as `None`.
pub(crate) fn optional_text(fields: &FieldMap, key: &str) -> Result<Option<String>, PayloadError> {
    match fields.get(key) {
        Some(value) => scalar_text(key, value),
        None => Ok(None),
    }
}

/// Update semantics: missing is "leave alone", null is "clear".
pub(crate) fn nullable_update(
    fields: &FieldMap,
    key: &str,
) -> Result<Option<Option<String>>, PayloadError> {
    match fields.get(key) {
        Some(value) => scalar_text(key, value).map(Some),
        None => Ok(None),
    }
}

/// Update semantics for a non-nullable column: null is rejected.
pub(crate) fn required_update(fields: &FieldMap, key: &str) -> Result<Option<String>, PayloadError> {
    match fields.get(key) {
        Some(value) => match scalar_text(key, value)? {
            Some(text) => Ok(Some(text)),
            None => Err(PayloadError::InvalidType {
                field: key.to_string(),
                expected: "a non-null value",
            }),
        },
        None => Ok(None),
    }
}

/// Deserialize helper keeping `null` distinct from an absent field.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
