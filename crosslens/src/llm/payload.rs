// Field accessors for schema-constrained model replies.
use serde_json::{Map, Value};

use crate::error::ServiceError;
use crate::normalize::prepare_list;

/// A required, non-blank string field.
pub fn required_str(payload: &Map<String, Value>, key: &str) -> Result<String, ServiceError> {
    let value = payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ServiceError::schema(format!("missing field '{}'", key)))?;
    let cleaned = value.trim();
    if cleaned.is_empty() {
        return Err(ServiceError::schema(format!("empty field '{}'", key)));
    }
    Ok(cleaned.to_string())
}

/// A required array of strings, cleaned with [`prepare_list`]. May be empty.
pub fn required_list(
    payload: &Map<String, Value>,
    key: &str,
    uppercase: bool,
) -> Result<Vec<String>, ServiceError> {
    let values = payload
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::schema(format!("missing list '{}'", key)))?;
    Ok(prepare_list(values, uppercase))
}

/// An optional string; `null`, blanks and absent keys become `None`, other
/// scalars are rendered as strings.
pub fn optional_str(payload: &Map<String, Value>, key: &str) -> Option<String> {
    let rendered = match payload.get(key)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!rendered.is_empty()).then_some(rendered)
}

/// Missing or null is `None`; anything other than a boolean breaks the schema.
pub fn optional_bool(payload: &Map<String, Value>, key: &str) -> Result<Option<bool>, ServiceError> {
    match payload.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(ServiceError::schema(format!("field '{}' is not a boolean", key))),
    }
}
