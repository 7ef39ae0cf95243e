// SPDX-License-Identifier: MIT

//! Typed error handling for flowrun-rs
//!
//! Engine failures are never surfaced to the caller of `execute` directly;
//! they are captured into the terminal `ExecutionState`. These types exist so
//! the capture sites and the boundary implementations stay precise about what
//! went wrong.

use thiserror::Error;

/// Errors raised while driving a graph execution.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The submitted graph has no nodes to execute
    #[error("Workflow has no nodes to execute")]
    EmptyGraph,

    /// A node's type tag has no registered handler
    #[error("No handler found for node type: {0}")]
    HandlerNotFound(String),

    /// A handler invocation failed (or its downstream external call did)
    #[error("Node '{node}' failed: {message}")]
    NodeFailed { node: String, message: String },
}

impl EngineError {
    /// Create a node failure error
    pub fn node_failed(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NodeFailed {
            node: node.into(),
            message: message.into(),
        }
    }
}

/// Structural problems with a graph definition or its textual form.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Node identifiers must be unique within a graph
    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    /// Every edge endpoint must reference an existing node
    #[error("Edge '{edge}' references unknown node: {node}")]
    UnknownNode { edge: String, node: String },

    /// YAML parsing errors from the text codec
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors while loading a flow file
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors from the text-generation gateway boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The provider rejected or failed the generation request
    #[error("Provider error from {provider}: {message}")]
    Provider { provider: String, message: String },

    /// The gateway could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The gateway answered with something unusable
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Create a provider error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Errors from the autonomous-coding-runtime bridge.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The bridge cannot be reached in this environment
    #[error("Coding runtime unavailable: {0}")]
    Unavailable(String),

    /// The bounded wait on a delegated task expired
    #[error("Delegated task timed out after {0} seconds")]
    Timeout(u64),

    /// I/O failure while talking to the bridge process
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
