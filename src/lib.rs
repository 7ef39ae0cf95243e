// SPDX-License-Identifier: MIT

//! flowrun-rs - graph-based task execution engine
//!
//! Runs a caller-supplied directed graph of heterogeneous work nodes
//! (text-generation calls, delegated coding tasks, conditional branches,
//! start/end markers) and reports progress through a live event stream.
//!
//! The entry point is [engine::FlowEngine]: submit a [graph::Graph], get back
//! a terminal [engine::ExecutionState], observe lifecycle events along the
//! way via [engine::FlowEngine::on_event]. External services are reached only
//! through the [gateway] boundary traits.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod graph;

pub use engine::FlowEngine;
