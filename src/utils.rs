//! Small helpers shared by the resource modules.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;

const RANDOM_ID_LENGTH: usize = 16;

/// A random alphanumeric identifier for objects GoCD does not name.
pub fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Flatten a list of API structs into attribute maps via a JSON round trip.
///
/// Field names follow the API's serde names, and fields the model skips
/// when empty are absent from the result.
pub fn map_slice<T: Serialize>(items: &[T]) -> Result<Vec<Value>, ProviderError> {
    items
        .iter()
        .map(|item| to_map(item).map(Value::Object))
        .collect()
}

/// Flatten a single API struct into an attribute map.
pub fn to_map<T: Serialize>(item: &T) -> Result<Map<String, Value>, ProviderError> {
    match serde_json::to_value(item)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ProviderError::Sdk(format!(
            "expected an object while flattening, got {}",
            other
        ))),
    }
}

/// The strings in a JSON array; anything else yields an empty list.
pub fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Read a string field out of an attribute map.
pub fn string_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Read an optional, non-empty string field out of an attribute map.
pub fn optional_string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a bool field out of an attribute map.
pub fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// Whether `items` contains `item`.
pub fn contains(items: &[String], item: &str) -> bool {
    items.iter().any(|candidate| candidate == item)
}
