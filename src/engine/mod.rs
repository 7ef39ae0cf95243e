// SPDX-License-Identifier: MIT

//! Graph execution engine: registry, event bus, state and traversal

pub mod conditions;
pub mod context;
pub mod events;
pub mod executor;
pub mod handlers;
pub mod registry;
pub mod state;

pub use context::NodeContext;
pub use events::{EventBus, EventKind, ExecutionEvent, Subscription};
pub use executor::FlowEngine;
pub use registry::{HandlerRegistry, NodeHandler};
pub use state::{ExecutionState, ExecutionStatus, NodeResult};
