//! `--set key=value` / `--clear key` argument handling.

use crate::error::{CliError, CliResult};
use govern_types::FieldMap;
use serde_json::Value;

/// Build a field mapping from assignments and cleared keys.
///
/// Values stay text; the typed payloads decide what each key means.
pub fn field_map(assignments: &[String], cleared: &[String]) -> CliResult<FieldMap> {
    let mut fields = FieldMap::new();
    for assignment in assignments {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            CliError::InvalidArgument(format!("expected KEY=VALUE, got `{assignment}`"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::InvalidArgument(format!(
                "empty key in `{assignment}`"
            )));
        }
        fields.insert(key.to_string(), Value::String(value.to_string()));
    }
    for key in cleared {
        if fields.contains_key(key.as_str()) {
            return Err(CliError::InvalidArgument(format!(
                "`{key}` is both set and cleared"
            )));
        }
        fields.insert(key.clone(), Value::Null);
    }
    Ok(fields)
}

/// Read upload rows from a JSON array of objects.
pub fn parse_rows(raw: &str) -> CliResult<Vec<FieldMap>> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        return Err(CliError::InvalidArgument(
            "upload file must hold a JSON array of objects".to_string(),
        ));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(fields),
            _ => Err(CliError::InvalidArgument(format!(
                "row {index} is not an object"
            ))),
        })
        .collect()
}
