// SPDX-License-Identifier: MIT

//! Per-run execution state
//!
//! One [ExecutionState] is created per `execute` call, mutated in place as
//! nodes complete, and stays queryable by id afterwards. Retention is a
//! caller concern; the engine never evicts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Lifecycle status of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    /// Advisory only: the traversal loop never consults this flag
    Paused,
    Completed,
    Error,
}

/// Outcome of a single node, at most one per node per run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub success: bool,
    /// Handler output, opaque to the engine
    pub output: Value,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl NodeResult {
    pub fn success(node_id: impl Into<String>, output: Value, elapsed: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            success: true,
            output,
            error: None,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failure(node_id: impl Into<String>, message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            node_id: node_id.into(),
            success: false,
            output: Value::Null,
            error: Some(message.into()),
            duration_ms: elapsed.as_millis() as u64,
        }
    }
}

/// The mutable record of one run of a graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionState {
    pub id: String,
    pub graph_id: String,
    pub status: ExecutionStatus,
    /// Per-node results keyed by node id
    pub results: HashMap<String, NodeResult>,
    /// Shared variable bag, seeded at start and mutable by handlers
    pub variables: HashMap<String, Value>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl ExecutionState {
    /// Create a fresh running state with a seeded variable bag
    pub fn new(graph_id: impl Into<String>, variables: HashMap<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            graph_id: graph_id.into(),
            status: ExecutionStatus::Running,
            results: HashMap::new(),
            variables,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    /// Mark the run completed and stamp the completion time.
    ///
    /// A cancel recorded mid-flight loses to a traversal that finished
    /// anyway: the error message is cleared along with the status.
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run failed with a captured message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = ExecutionStatus::Error;
        self.error = Some(message.into());
        self.completed_at = Some(Utc::now());
    }

    /// Inputs for the next node: the variable bag merged with every
    /// completed node's output, keyed by that node's id.
    pub fn merged_inputs(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.variables {
            map.insert(key.clone(), value.clone());
        }
        for (node_id, result) in &self.results {
            map.insert(node_id.clone(), result.output.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_state_is_running() {
        let state = ExecutionState::new("g1", HashMap::new());
        assert_eq!(state.status, ExecutionStatus::Running);
        assert!(!state.id.is_empty());
        assert!(state.completed_at.is_none());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = ExecutionState::new("g1", HashMap::new());
        let b = ExecutionState::new("g1", HashMap::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_complete_stamps_time() {
        let mut state = ExecutionState::new("g1", HashMap::new());
        state.complete();
        assert_eq!(state.status, ExecutionStatus::Completed);
        assert!(state.completed_at.is_some());
        assert!(state.error.is_none());
    }

    #[test]
    fn test_complete_after_fail_clears_the_error() {
        let mut state = ExecutionState::new("g1", HashMap::new());
        state.fail("Cancelled by user");
        state.complete();
        assert_eq!(state.status, ExecutionStatus::Completed);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_fail_captures_message() {
        let mut state = ExecutionState::new("g1", HashMap::new());
        state.fail("it broke");
        assert_eq!(state.status, ExecutionStatus::Error);
        assert_eq!(state.error.as_deref(), Some("it broke"));
        assert!(state.completed_at.is_some());
    }

    #[test]
    fn test_merged_inputs_combines_variables_and_outputs() {
        let mut variables = HashMap::new();
        variables.insert("topic".to_string(), json!("releases"));

        let mut state = ExecutionState::new("g1", variables);
        state.results.insert(
            "draft".to_string(),
            NodeResult::success("draft", json!({"text": "done"}), Duration::from_millis(5)),
        );

        let inputs = state.merged_inputs();
        assert_eq!(inputs["topic"], json!("releases"));
        assert_eq!(inputs["draft"]["text"], json!("done"));
    }

    #[test]
    fn test_node_result_failure_has_null_output() {
        let result = NodeResult::failure("n1", "boom", Duration::from_millis(12));
        assert!(!result.success);
        assert_eq!(result.output, Value::Null);
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert_eq!(result.duration_ms, 12);
    }
}
