// SPDX-License-Identifier: MIT

//! Event bus - synchronous publish/subscribe for lifecycle notifications
//!
//! Every listener receives every event from every execution, in emission
//! order, delivered on the emitting task. Callers running concurrent
//! executions filter by `execution_id` themselves. The listener set may be
//! mutated at any time, including from inside a listener.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Start,
    NodeStart,
    NodeComplete,
    NodeError,
    Complete,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Start => "start",
            EventKind::NodeStart => "node_start",
            EventKind::NodeComplete => "node_complete",
            EventKind::NodeError => "node_error",
            EventKind::Complete => "complete",
            EventKind::Error => "error",
        };
        f.write_str(name)
    }
}

/// A single lifecycle notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub kind: EventKind,
    pub execution_id: String,
    /// Set on node-scoped kinds
    pub node_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Kind-specific payload: node output on `node_complete`, error message
    /// on `node_error`/`error`
    pub payload: Option<Value>,
}

impl ExecutionEvent {
    pub fn new(kind: EventKind, execution_id: impl Into<String>) -> Self {
        Self {
            kind,
            execution_id: execution_id.into(),
            node_id: None,
            timestamp: Utc::now(),
            payload: None,
        }
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

pub type EventListener = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    /// Subscription order doubles as delivery order
    listeners: Mutex<Vec<(u64, EventListener)>>,
}

/// Shared publish/subscribe channel
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; drop it again via [Subscription::unsubscribe]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Deliver an event to every listener, synchronously and in order.
    ///
    /// The listener set is snapshotted first so listeners may subscribe or
    /// unsubscribe mid-delivery without deadlocking.
    pub fn emit(&self, event: ExecutionEvent) {
        let snapshot: Vec<EventListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            listener(&event);
        }
    }
}

/// Handle for removing a registered listener
pub struct Subscription {
    id: u64,
    inner: Arc<BusInner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.inner.listeners.lock().retain(|(id, _)| *id != self.id);
    }
}
