// SPDX-License-Identifier: MIT

//! Execution context handed to node handlers

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::events::{EventBus, EventKind, ExecutionEvent};
use super::state::ExecutionState;

/// A handler's window into the execution driving it.
///
/// Exposes the current state, the event emitter and the shared variable bag.
/// The state reference is the same one the engine mutates, so snapshots taken
/// mid-run observe progressively more completed results.
#[derive(Clone)]
pub struct NodeContext {
    execution_id: String,
    state: Arc<RwLock<ExecutionState>>,
    events: EventBus,
}

impl NodeContext {
    pub(crate) fn new(
        execution_id: impl Into<String>,
        state: Arc<RwLock<ExecutionState>>,
        events: EventBus,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            state,
            events,
        }
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Read a shared variable
    pub async fn variable(&self, key: &str) -> Option<Value> {
        self.state.read().await.variables.get(key).cloned()
    }

    /// Write a shared variable, visible to every later node
    pub async fn set_variable(&self, key: impl Into<String>, value: Value) {
        self.state.write().await.variables.insert(key.into(), value);
    }

    /// Clone the current execution state
    pub async fn snapshot(&self) -> ExecutionState {
        self.state.read().await.clone()
    }

    /// Emit an event on behalf of the running node
    pub fn emit(&self, kind: EventKind, node_id: Option<String>, payload: Option<Value>) {
        let mut event = ExecutionEvent::new(kind, &self.execution_id);
        event.node_id = node_id;
        event.payload = payload;
        self.events.emit(event);
    }
}
