// SPDX-License-Identifier: MIT

//! Graph model - immutable description of nodes, edges and shared variables
//!
//! A [Graph] is supplied by an external caller (editor, generator, file) and
//! is read-only to the engine. The text codec in [codec] maps between this
//! model and its YAML form.

pub mod codec;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::error::GraphError;

/// A complete, caller-supplied workflow graph
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Graph {
    /// Unique graph identifier
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Optional description, carried for external editors
    #[serde(default)]
    pub description: String,
    /// Definition version
    pub version: u32,
    /// Nodes in declaration order
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Edges in declaration order
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Shared variable bag seeding each execution
    #[serde(default)]
    pub variables: HashMap<String, Value>,
}

/// A single unit of work in a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within the graph
    pub id: String,
    /// Type tag resolved against the handler registry
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display label, irrelevant to engine semantics
    #[serde(default)]
    pub label: String,
    /// Visual position, carried only for the external editor
    #[serde(default)]
    pub position: Position,
    /// Type-specific payload (prompt text, task description, branch conditions)
    #[serde(default)]
    pub data: Value,
}

/// A directed connection between two nodes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Unique edge identifier
    pub id: String,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Output port on a multi-output node (e.g. a conditional's true/false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input port on the target node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Editor canvas position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Graph {
    /// Look up a node by id
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check the structural invariants: node ids are unique and every edge
    /// endpoint references an existing node.
    pub fn validate(&self) -> Result<(), GraphError> {
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(GraphError::DuplicateNodeId(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(GraphError::UnknownNode {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
