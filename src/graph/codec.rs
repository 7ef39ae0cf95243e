//! Graph text codec - YAML flow documents mapped to and from the graph model
//!
//! The textual form is what editors and the CLI trade in:
//!
//! ```yaml
//! name: Review pipeline
//! description: Draft, review, branch on the verdict
//! variables:
//!   topic: release notes
//! nodes:
//!   - id: start
//!     type: start
//!   - id: draft
//!     type: prompt
//!     label: Draft
//!     config:
//!       prompt: "Write about {{topic}}"
//! edges:
//!   - from: start
//!     to: draft
//! ```
//!
//! Parsing injects defaults (fresh graph id, version 1, grid positions, edge
//! ids), so round-tripping is not byte-identical, but node/edge identity,
//! ordering and all semantic fields survive.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use super::{Edge, Graph, Node, Position};
use crate::error::GraphError;

/// Parse a flow document into a validated [Graph]
pub fn parse(text: &str) -> Result<Graph, GraphError> {
    let doc: FlowDoc = serde_yaml::from_str(text)?;
    let graph = doc.into_graph();
    graph.validate()?;
    Ok(graph)
}

/// Serialize a [Graph] back to its textual form
pub fn serialize(graph: &Graph) -> Result<String, GraphError> {
    let doc = FlowDoc::from_graph(graph);
    Ok(serde_yaml::to_string(&doc)?)
}

/// Load and parse a flow document from a file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Graph, GraphError> {
    let content = fs::read_to_string(path)?;
    parse(&content)
}

#[derive(Debug, Serialize, Deserialize)]
struct FlowDoc {
    name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    variables: HashMap<String, Value>,
    #[serde(default)]
    nodes: Vec<NodeDoc>,
    #[serde(default)]
    edges: Vec<EdgeDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeDoc {
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    label: String,
    #[serde(default, skip_serializing_if = "config_is_empty")]
    config: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    position: Option<Position>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeDoc {
    from: String,
    to: String,
    /// Source-handle label, e.g. a conditional branch id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
}

fn config_is_empty(config: &Value) -> bool {
    match config {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Default grid layout for nodes that omit a position
fn default_position(index: usize) -> Position {
    Position {
        x: 100.0 + 220.0 * (index % 4) as f64,
        y: 100.0 + 160.0 * (index / 4) as f64,
    }
}

impl FlowDoc {
    fn into_graph(self) -> Graph {
        let nodes = self
            .nodes
            .into_iter()
            .enumerate()
            .map(|(i, n)| Node {
                id: n.id,
                node_type: n.node_type,
                label: n.label,
                position: n.position.unwrap_or_else(|| default_position(i)),
                data: match n.config {
                    Value::Null => Value::Object(serde_json::Map::new()),
                    other => other,
                },
            })
            .collect();

        let edges = self
            .edges
            .into_iter()
            .enumerate()
            .map(|(i, e)| Edge {
                id: format!("edge-{}", i + 1),
                source: e.from,
                target: e.to,
                source_handle: e.condition,
                target_handle: None,
                label: e.label,
            })
            .collect();

        Graph {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            description: self.description,
            version: 1,
            nodes,
            edges,
            variables: self.variables,
        }
    }

    fn from_graph(graph: &Graph) -> Self {
        Self {
            name: graph.name.clone(),
            description: graph.description.clone(),
            variables: graph.variables.clone(),
            nodes: graph
                .nodes
                .iter()
                .map(|n| NodeDoc {
                    id: n.id.clone(),
                    node_type: n.node_type.clone(),
                    label: n.label.clone(),
                    config: n.data.clone(),
                    position: Some(n.position),
                })
                .collect(),
            edges: graph
                .edges
                .iter()
                .map(|e| EdgeDoc {
                    from: e.source.clone(),
                    to: e.target.clone(),
                    condition: e.source_handle.clone(),
                    label: e.label.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"
name: Review pipeline
description: "Draft then branch"
variables:
  topic: release notes
nodes:
  - id: start
    type: start
  - id: draft
    type: prompt
    label: Draft
    config:
      prompt: "Write about {{topic}}"
    position: { x: 400, y: 80 }
  - id: verdict
    type: condition
    config:
      conditions:
        - id: "true"
          when: "draft.text contains 'notes'"
edges:
  - from: start
    to: draft
  - from: draft
    to: verdict
  - from: verdict
    to: draft
    condition: "false"
"#;

    #[test]
    fn test_parse_injects_defaults() {
        let graph = parse(SAMPLE).unwrap();
        assert!(!graph.id.is_empty());
        assert_eq!(graph.version, 1);
        assert_eq!(graph.name, "Review pipeline");
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 3);

        // First node had no position: gets a grid default
        assert_eq!(graph.nodes[0].position, default_position(0));
        // Second node keeps its declared position
        assert_eq!(graph.nodes[1].position, Position { x: 400.0, y: 80.0 });
        // Omitted config becomes an empty object
        assert_eq!(graph.nodes[0].data, json!({}));

        // Edge ids follow declaration order
        assert_eq!(graph.edges[0].id, "edge-1");
        assert_eq!(graph.edges[2].id, "edge-3");
        // The condition label lands on the source handle
        assert_eq!(graph.edges[2].source_handle.as_deref(), Some("false"));
        assert!(graph.edges[0].source_handle.is_none());
    }

    #[test]
    fn test_parse_preserves_variables_and_config() {
        let graph = parse(SAMPLE).unwrap();
        assert_eq!(graph.variables.get("topic"), Some(&json!("release notes")));
        assert_eq!(
            graph.nodes[1].data["prompt"],
            json!("Write about {{topic}}")
        );
    }

    #[test]
    fn test_round_trip_preserves_semantics() {
        let first = parse(SAMPLE).unwrap();
        let text = serialize(&first).unwrap();
        let second = parse(&text).unwrap();

        assert_eq!(second.name, first.name);
        assert_eq!(second.description, first.description);
        assert_eq!(second.variables, first.variables);
        assert_eq!(second.nodes.len(), first.nodes.len());
        for (a, b) in first.nodes.iter().zip(&second.nodes) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.node_type, b.node_type);
            assert_eq!(a.label, b.label);
            assert_eq!(a.data, b.data);
            assert_eq!(a.position, b.position);
        }
        for (a, b) in first.edges.iter().zip(&second.edges) {
            assert_eq!(a.source, b.source);
            assert_eq!(a.target, b.target);
            assert_eq!(a.source_handle, b.source_handle);
        }
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let graph = parse("name: tiny\nnodes:\n  - id: only\n    type: start\n").unwrap();
        let text = serialize(&graph).unwrap();
        assert!(!text.contains("description"));
        assert!(!text.contains("variables"));
        assert!(!text.contains("config"));
        assert!(!text.contains("condition"));
    }

    #[test]
    fn test_parse_rejects_dangling_edge() {
        let text = r#"
name: broken
nodes:
  - id: a
    type: start
edges:
  - from: a
    to: missing
"#;
        assert!(parse(text).is_err());
    }

    #[test]
    fn test_invalid_yaml_returns_error() {
        let result = parse("name:\n  - not\n  a: flow\n");
        assert!(result.is_err());
    }
}
