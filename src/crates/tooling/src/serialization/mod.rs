//! Canonical JSON and content digests
//!
//! Values are hashed through their canonical JSON form: object keys sorted
//! at every depth, no insignificant whitespace. Two values that differ only
//! in key order share a digest; any other difference changes it. The same
//! digest serves as a cache key and as a definition fingerprint.

use crate::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the canonical JSON form of `value`
///
/// ```rust
/// use tooling::serialization::digest_value;
/// use serde_json::json;
///
/// let a = digest_value(&json!({"b": 2, "a": 1})).unwrap();
/// let b = digest_value(&json!({"a": 1, "b": 2})).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.len(), 64);
/// ```
pub fn digest_value(value: &Value) -> Result<String> {
    Ok(digest_bytes(canonical_json(value)?.as_bytes()))
}

/// Digest of anything serializable, via its JSON value
pub fn digest<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    digest_value(&serde_json::to_value(value)?)
}

/// Lowercase hex SHA-256 of raw bytes
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Canonical JSON text of a value
///
/// ```rust
/// use tooling::serialization::canonical_json;
/// use serde_json::json;
///
/// let text = canonical_json(&json!({"b": [2, 1], "a": {"y": 1, "x": 0}})).unwrap();
/// assert_eq!(text, r#"{"a":{"x":0,"y":1},"b":[2,1]}"#);
/// ```
pub fn canonical_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&canonicalize(value))?)
}

/// Canonical JSON text of anything serializable
pub fn to_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    canonical_json(&serde_json::to_value(value)?)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key.clone(), canonicalize(inner)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        scalar => scalar.clone(),
    }
}

/// Shorten text for a log line, cutting on a char boundary and appending `...`
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let mut shortened: String = text.chars().take(keep).collect();
    shortened.push_str("...");
    shortened
}
