//! Raw input values and key-path lookup.

use serde_json::Value;

/// An untyped value decoded from external data.
pub type RawValue = Value;

/// An untyped dictionary decoded from external data.
pub type RawDictionary = serde_json::Map<String, Value>;

/// Look up a key path in a raw dictionary.
///
/// The whole key path is first tried as a literal key, then as a dot-separated
/// path through nested objects. A present `null` is returned as `Some(Value::Null)`.
pub fn value_for_key_path<'a>(dictionary: &'a RawDictionary, key_path: &str) -> Option<&'a Value> {
    if let Some(value) = dictionary.get(key_path) {
        return Some(value);
    }
    if !key_path.contains('.') {
        return None;
    }

    let mut segments = key_path.split('.');
    let mut current = dictionary.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// The value of the first candidate key path present in `dictionary`.
///
/// Only an absent key falls through to the next candidate; a present `null` wins.
pub fn select_value<'a>(dictionary: &'a RawDictionary, key_paths: &[&str]) -> Option<&'a Value> {
    key_paths
        .iter()
        .find_map(|key_path| value_for_key_path(dictionary, key_path))
}
