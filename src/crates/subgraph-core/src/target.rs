//! Targets: the sub-graphs a runner invokes
//!
//! A [`Target`] pairs a [`TargetRef`] (identity handed to the invoker) with
//! the [`TargetDefinition`] it was built from. The definition is only read
//! to derive the input schema and the fingerprint used for cache
//! invalidation.

use crate::error::Result;
use crate::schema::{InputSchema, InputSlot};
use crate::value::kind_of_data_type;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tooling::serialization::digest_value;

/// Node type marking an input slot of a sub-graph
pub const INPUT_NODE_TYPE: &str = "graphInput";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub data: Value,
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data,
        }
    }

    /// Input node with the given slot key
    pub fn graph_input(id: impl Into<String>, key: &str, data_type: &str) -> Self {
        Self::new(id, INPUT_NODE_TYPE, json!({ "id": key, "dataType": data_type }))
    }

    pub fn is_graph_input(&self) -> bool {
        self.node_type == INPUT_NODE_TYPE
    }

    fn input_slot(&self) -> Option<InputSlot> {
        let key = self.data.get("id").and_then(Value::as_str)?;
        if key.is_empty() {
            return None;
        }

        let has_default = match self.data.get("defaultValue") {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        };

        Some(InputSlot {
            key: key.to_string(),
            kind: self
                .data
                .get("dataType")
                .and_then(Value::as_str)
                .and_then(kind_of_data_type),
            required: !has_default,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub output_node_id: String,
    pub output_id: String,
    pub input_node_id: String,
    pub input_id: String,
}

impl Connection {
    pub fn new(
        output_node_id: impl Into<String>,
        output_id: impl Into<String>,
        input_node_id: impl Into<String>,
        input_id: impl Into<String>,
    ) -> Self {
        Self {
            output_node_id: output_node_id.into(),
            output_id: output_id.into(),
            input_node_id: input_node_id.into(),
            input_id: input_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetDefinition {
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl TargetDefinition {
    pub fn new(nodes: Vec<NodeDefinition>) -> Self {
        Self {
            nodes,
            connections: Vec::new(),
        }
    }

    pub fn with_connections(mut self, connections: Vec<Connection>) -> Self {
        self.connections = connections;
        self
    }

    /// Schema from the definition's input nodes, in node order
    pub fn input_schema(&self) -> InputSchema {
        self.nodes
            .iter()
            .filter(|node| node.is_graph_input())
            .filter_map(NodeDefinition::input_slot)
            .fold(InputSchema::new(), InputSchema::with_slot)
    }
}

/// Identity of a target as seen by the invoker
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub target_id: String,
    pub name: String,
}

impl TargetRef {
    pub fn new(target_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            name: name.into(),
        }
    }

    /// Both id and name are set
    pub fn is_valid(&self) -> bool {
        !self.target_id.trim().is_empty() && !self.name.trim().is_empty()
    }
}

/// What a fingerprint covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintScope {
    /// Node data only
    Nodes,
    /// Node data and connections
    NodesAndConnections,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    reference: TargetRef,
    definition: TargetDefinition,
    schema: InputSchema,
}

impl Target {
    /// Build a target, deriving its schema from the definition
    pub fn new(reference: TargetRef, definition: TargetDefinition) -> Self {
        let schema = definition.input_schema();
        Self {
            reference,
            definition,
            schema,
        }
    }

    /// Replace the derived schema
    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn reference(&self) -> &TargetRef {
        &self.reference
    }

    pub fn id(&self) -> &str {
        &self.reference.target_id
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn definition(&self) -> &TargetDefinition {
        &self.definition
    }

    pub fn schema(&self) -> &InputSchema {
        &self.schema
    }

    /// Digest over the definition
    ///
    /// Equal definitions give equal fingerprints; any change to node data
    /// (or connections, for [`FingerprintScope::NodesAndConnections`]) gives
    /// a different one.
    pub fn fingerprint(&self, scope: FingerprintScope) -> Result<String> {
        let node_data: Vec<&Value> = self.definition.nodes.iter().map(|n| &n.data).collect();
        let value = match scope {
            FingerprintScope::Nodes => serde_json::to_value(&node_data)?,
            FingerprintScope::NodesAndConnections => json!({
                "nodes": node_data,
                "connections": self.definition.connections,
            }),
        };
        Ok(digest_value(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueKind;

    fn summarize() -> Target {
        Target::new(
            TargetRef::new("g-summarize", "Summarize"),
            TargetDefinition::new(vec![
                NodeDefinition::graph_input("n1", "text", "string"),
                NodeDefinition::new(
                    "n2",
                    "graphInput",
                    json!({"id": "style", "dataType": "string", "defaultValue": "short"}),
                ),
                NodeDefinition::graph_input("n3", "examples", "string[]"),
                NodeDefinition::new("n4", "chat", json!({"model": "small"})),
            ]),
        )
    }

    #[test]
    fn test_schema_from_input_nodes() {
        let target = summarize();
        assert_eq!(target.schema().expected_keys(), vec!["text", "examples"]);

        let slots = target.schema().slots();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].kind, Some(ValueKind::Scalar));
        assert!(!slots[1].required);
        assert_eq!(slots[2].kind, Some(ValueKind::Array));
    }

    #[test]
    fn test_unknown_data_type_accepts_any_kind() {
        let definition =
            TargetDefinition::new(vec![NodeDefinition::graph_input("n1", "msg", "chat-message")]);
        assert_eq!(definition.input_schema().slots()[0].kind, None);
    }

    #[test]
    fn test_fingerprint_stable() {
        let a = summarize().fingerprint(FingerprintScope::Nodes).unwrap();
        let b = summarize().fingerprint(FingerprintScope::Nodes).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_node_data() {
        let original = summarize();
        let mut definition = original.definition().clone();
        definition.nodes[3].data = json!({"model": "large"});
        let changed = Target::new(original.reference().clone(), definition);

        assert_ne!(
            original.fingerprint(FingerprintScope::Nodes).unwrap(),
            changed.fingerprint(FingerprintScope::Nodes).unwrap()
        );
    }

    #[test]
    fn test_connections_only_count_in_wide_scope() {
        let original = summarize();
        let rewired = Target::new(
            original.reference().clone(),
            original
                .definition()
                .clone()
                .with_connections(vec![Connection::new("n1", "data", "n4", "prompt")]),
        );

        assert_eq!(
            original.fingerprint(FingerprintScope::Nodes).unwrap(),
            rewired.fingerprint(FingerprintScope::Nodes).unwrap()
        );
        assert_ne!(
            original
                .fingerprint(FingerprintScope::NodesAndConnections)
                .unwrap(),
            rewired
                .fingerprint(FingerprintScope::NodesAndConnections)
                .unwrap()
        );
    }

    #[test]
    fn test_target_ref_validity() {
        assert!(TargetRef::new("g1", "Graph").is_valid());
        assert!(!TargetRef::new("", "Graph").is_valid());
        assert!(!TargetRef::new("g1", " ").is_valid());
    }

    #[test]
    fn test_definition_deserializes() {
        let definition: TargetDefinition = serde_json::from_value(json!({
            "nodes": [{"id": "n1", "type": "graphInput", "data": {"id": "a"}}],
            "connections": [{"outputNodeId": "n1", "outputId": "data", "inputNodeId": "n2", "inputId": "in"}]
        }))
        .unwrap();
        assert_eq!(definition.connections.len(), 1);
        assert_eq!(definition.input_schema().expected_keys(), vec!["a"]);
    }
}
