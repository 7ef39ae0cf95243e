// SPDX-License-Identifier: MIT

//! Handler registry - maps node type tags to executable handlers

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use super::context::NodeContext;
use crate::graph::Node;

/// Executable logic bound to a node type tag.
///
/// `inputs` is the shared variable bag merged with every already-completed
/// node's output; `ctx` exposes the live execution state, the event emitter
/// and the variable bag mutators.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn execute(
        &self,
        node: &Node,
        inputs: &Value,
        ctx: &NodeContext,
    ) -> Result<Value, Box<dyn Error + Send + Sync>>;
}

/// Registry of node handlers, shared across concurrent executions.
///
/// Registration is expected at setup time; re-registering a tag overwrites
/// the previous handler.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn NodeHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tag: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        let tag = tag.into();
        log::debug!("Registering handler for node type '{}'", tag);
        self.handlers.write().insert(tag, handler);
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn NodeHandler>> {
        self.handlers.read().get(tag).cloned()
    }

    /// The currently registered type tags, unordered
    pub fn tags(&self) -> Vec<String> {
        self.handlers.read().keys().cloned().collect()
    }
}
