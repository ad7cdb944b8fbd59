use serde_json::Value;

use crate::error::ServiceError;

/// Trim a free-text query and collapse interior whitespace to single spaces.
pub fn normalize_query(raw: &str) -> Result<String, ServiceError> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Err(ServiceError::invalid("Query cannot be empty after normalisation"));
    }
    Ok(normalized)
}

/// Clean a list of model-provided values: non-strings and blanks are dropped,
/// the rest trimmed (and uppercased for country codes).
pub fn prepare_list<'a, I>(values: I, uppercase: bool) -> Vec<String>
where
    I: IntoIterator<Item = &'a Value>,
{
    values
        .into_iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| if uppercase { item.to_uppercase() } else { item.to_string() })
        .collect()
}
