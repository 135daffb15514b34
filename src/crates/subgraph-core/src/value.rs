//! Data values and work items
//!
//! JSON values are classified once, when they enter the runner, into a
//! closed set of [`DataValue`] variants. Everything downstream matches on
//! the variant instead of re-inspecting JSON.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Marker `type` of values produced by branches that did not run
pub const EXCLUDED_TYPE: &str = "control-flow-excluded";

/// Marker `type` of the `{type, value}` object envelope
const OBJECT_ENVELOPE_TYPE: &str = "object";

/// Named outputs of one invocation
pub type Outputs = Map<String, Value>;

/// Shape of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Scalar,
    Array,
    Object,
    Excluded,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A classified input value
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Strings, numbers, booleans and null
    Scalar(Value),
    Array(Vec<Value>),
    Object(Map<String, Value>),
    /// `{"type": <data type>, "value": ...}` entry
    Typed { data_type: String, value: Value },
    /// Output of a branch that was skipped, kept as received
    Excluded(Map<String, Value>),
}

impl DataValue {
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => DataValue::Array(items),
            Value::Object(map) if is_excluded(&map) => DataValue::Excluded(map),
            Value::Object(mut map) => match typed_entry_type(&map) {
                Some(data_type) => DataValue::Typed {
                    data_type,
                    value: map.remove("value").unwrap_or(Value::Null),
                },
                None => DataValue::Object(map),
            },
            scalar => DataValue::Scalar(scalar),
        }
    }

    /// Skipped-branch sentinel carrying `value`
    pub fn excluded(value: Value) -> Self {
        let mut map = Map::new();
        map.insert("type".into(), Value::String(EXCLUDED_TYPE.into()));
        map.insert("value".into(), value);
        DataValue::Excluded(map)
    }

    /// Shape of the value
    ///
    /// A typed entry takes the shape of its declared data type, or of its
    /// inner value when the type does not name a shape.
    pub fn kind(&self) -> ValueKind {
        match self {
            DataValue::Scalar(_) => ValueKind::Scalar,
            DataValue::Array(_) => ValueKind::Array,
            DataValue::Object(_) => ValueKind::Object,
            DataValue::Typed { data_type, value } => {
                kind_of_data_type(data_type).unwrap_or_else(|| shape_of(value))
            }
            DataValue::Excluded(_) => ValueKind::Excluded,
        }
    }

    /// Whether the value is acceptable where `expected` is declared
    ///
    /// Excluded values always are. A typed entry is also an object, so it
    /// fits an object slot whatever its declared type.
    pub fn fits(&self, expected: ValueKind) -> bool {
        match self {
            DataValue::Excluded(_) => true,
            DataValue::Typed { .. } if expected == ValueKind::Object => true,
            other => other.kind() == expected,
        }
    }

    pub fn to_json(&self) -> Value {
        self.clone().into_json()
    }

    pub fn into_json(self) -> Value {
        match self {
            DataValue::Scalar(value) => value,
            DataValue::Array(items) => Value::Array(items),
            DataValue::Object(map) | DataValue::Excluded(map) => Value::Object(map),
            DataValue::Typed { data_type, value } => json!({ "type": data_type, "value": value }),
        }
    }
}

impl From<Value> for DataValue {
    fn from(value: Value) -> Self {
        DataValue::from_json(value)
    }
}

impl Serialize for DataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(DataValue::from_json)
    }
}

/// Map a declared data type to the value shape it requires
///
/// `None` for types that do not constrain the shape (`any`, custom types).
pub fn kind_of_data_type(data_type: &str) -> Option<ValueKind> {
    if data_type.ends_with("[]") || data_type == "vector" {
        return Some(ValueKind::Array);
    }
    match data_type {
        "string" | "number" | "boolean" | "date" | "time" | "datetime" => Some(ValueKind::Scalar),
        "object" => Some(ValueKind::Object),
        _ => None,
    }
}

fn shape_of(value: &Value) -> ValueKind {
    match value {
        Value::Array(_) => ValueKind::Array,
        Value::Object(_) => ValueKind::Object,
        _ => ValueKind::Scalar,
    }
}

fn is_excluded(map: &Map<String, Value>) -> bool {
    map.get("type").and_then(Value::as_str) == Some(EXCLUDED_TYPE)
}

fn typed_entry_type(map: &Map<String, Value>) -> Option<String> {
    if map.len() != 2 || !map.contains_key("value") {
        return None;
    }
    map.get("type").and_then(Value::as_str).map(str::to_string)
}

/// Input payload of a single invocation
///
/// Keys are kept sorted, so two items with the same entries serialize
/// identically and hash to the same cache key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItem {
    entries: BTreeMap<String, DataValue>,
}

impl WorkItem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an item from a JSON value at the runner boundary
    ///
    /// Accepts a plain object or an object envelope
    /// `{"type": "object", "value": {...}}`. Returns `None` for anything else.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(mut map) => {
                if is_object_envelope(&map) {
                    match map.remove("value") {
                        Some(Value::Object(inner)) => Some(Self::from_map(inner)),
                        _ => None,
                    }
                } else {
                    Some(Self::from_map(map))
                }
            }
            _ => None,
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            entries: map
                .into_iter()
                .map(|(key, value)| (key, DataValue::from_json(value)))
                .collect(),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DataValue>) -> Option<DataValue> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<DataValue> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&DataValue> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DataValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.to_map())
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect()
    }
}

impl From<Map<String, Value>> for WorkItem {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn is_object_envelope(map: &Map<String, Value>) -> bool {
    map.len() == 2
        && map.get("type").and_then(Value::as_str) == Some(OBJECT_ENVELOPE_TYPE)
        && map.contains_key("value")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(DataValue::from_json(json!(1)).kind(), ValueKind::Scalar);
        assert_eq!(DataValue::from_json(json!("text")).kind(), ValueKind::Scalar);
        assert_eq!(DataValue::from_json(Value::Null).kind(), ValueKind::Scalar);
        assert_eq!(DataValue::from_json(json!([1, 2])).kind(), ValueKind::Array);
        assert_eq!(DataValue::from_json(json!({"a": 1})).kind(), ValueKind::Object);
        assert_eq!(
            DataValue::from_json(json!({"type": "control-flow-excluded", "value": null})).kind(),
            ValueKind::Excluded
        );
    }

    #[test]
    fn test_typed_entries_take_declared_shape() {
        let number = DataValue::from_json(json!({"type": "number", "value": 1}));
        assert_eq!(number.kind(), ValueKind::Scalar);
        assert!(number.fits(ValueKind::Scalar));
        assert!(number.fits(ValueKind::Object));
        assert!(!number.fits(ValueKind::Array));

        let list = DataValue::from_json(json!({"type": "string[]", "value": ["a", "b"]}));
        assert_eq!(list.kind(), ValueKind::Array);

        let any = DataValue::from_json(json!({"type": "any", "value": [1]}));
        assert_eq!(any.kind(), ValueKind::Array);
    }

    #[test]
    fn test_typed_entry_round_trips() {
        let raw = json!({"type": "number", "value": 1});
        assert_eq!(DataValue::from_json(raw.clone()).into_json(), raw);
    }

    #[test]
    fn test_excluded_keeps_payload() {
        let raw = json!({"type": "control-flow-excluded", "value": {"reason": "branch off"}});
        let value = DataValue::from_json(raw.clone());
        assert_eq!(value.kind(), ValueKind::Excluded);
        assert_eq!(value.to_json(), raw);
        assert_eq!(DataValue::excluded(json!({"reason": "branch off"})), value);
    }

    #[test]
    fn test_item_from_plain_object() {
        let item = WorkItem::from_json(json!({"b": [1], "a": 1})).unwrap();
        assert_eq!(item.len(), 2);
        assert_eq!(item.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(item.get("b").unwrap().kind(), ValueKind::Array);
    }

    #[test]
    fn test_item_from_envelope() {
        let item = WorkItem::from_json(json!({"type": "object", "value": {"a": 1}})).unwrap();
        assert_eq!(item.to_json(), json!({"a": 1}));
    }

    #[test]
    fn test_envelope_with_non_object_value_rejected() {
        assert!(WorkItem::from_json(json!({"type": "object", "value": 3})).is_none());
    }

    #[test]
    fn test_object_with_extra_keys_is_not_envelope() {
        let item = WorkItem::from_json(json!({"type": "object", "value": 1, "x": 2})).unwrap();
        assert_eq!(item.len(), 3);
    }

    #[test]
    fn test_non_objects_rejected() {
        assert!(WorkItem::from_json(json!(1)).is_none());
        assert!(WorkItem::from_json(json!("a")).is_none());
        assert!(WorkItem::from_json(json!([{"a": 1}])).is_none());
        assert!(WorkItem::from_json(Value::Null).is_none());
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let item = WorkItem::new()
            .with("a", json!(1))
            .with("skip", DataValue::excluded(json!(null)));
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({"a": 1, "skip": {"type": "control-flow-excluded", "value": null}})
        );
        assert_eq!(
            item.to_string(),
            r#"{"a":1,"skip":{"type":"control-flow-excluded","value":null}}"#
        );
    }
}
