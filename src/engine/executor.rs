//! Execution engine - depth-first traversal of a workflow graph
//!
//! One engine owns a handler registry, an event bus and the table of
//! executions it has driven. `execute` never returns an error to the caller:
//! every failure is captured into the terminal [ExecutionState] and surfaced
//! through `node_error`/`error` events.

use futures::future::{BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::context::NodeContext;
use super::events::{EventBus, EventKind, ExecutionEvent, Subscription};
use super::handlers::{
    AgentTaskHandler, ConditionHandler, EndHandler, PromptHandler, StartHandler, AGENT_TYPE,
    CONDITION_TYPE, END_TYPE, PROMPT_TYPE, START_TYPE,
};
use super::registry::{HandlerRegistry, NodeHandler};
use super::state::{ExecutionState, ExecutionStatus, NodeResult};
use crate::error::EngineError;
use crate::gateway::bridge::{CodingRuntime, ProcessRuntime};
use crate::gateway::{EchoGateway, TextGateway};
use crate::graph::Graph;

type ExecutionTable = Arc<RwLock<HashMap<String, Arc<RwLock<ExecutionState>>>>>;

/// Graph execution engine
#[derive(Clone)]
pub struct FlowEngine {
    handlers: HandlerRegistry,
    events: EventBus,
    executions: ExecutionTable,
}

impl FlowEngine {
    /// Engine with the default boundaries: the echo gateway and the local
    /// agent CLI bridge configured from the environment.
    pub fn new() -> Self {
        Self::with_boundaries(
            Arc::new(EchoGateway::new()),
            Arc::new(ProcessRuntime::from_env()),
        )
    }

    /// Engine wired to explicit boundary implementations
    pub fn with_boundaries(
        gateway: Arc<dyn TextGateway>,
        runtime: Arc<dyn CodingRuntime>,
    ) -> Self {
        let handlers = HandlerRegistry::new();
        handlers.register(START_TYPE, Arc::new(StartHandler));
        handlers.register(END_TYPE, Arc::new(EndHandler));
        handlers.register(PROMPT_TYPE, Arc::new(PromptHandler::new(gateway)));
        handlers.register(AGENT_TYPE, Arc::new(AgentTaskHandler::new(runtime)));
        handlers.register(CONDITION_TYPE, Arc::new(ConditionHandler));

        Self {
            handlers,
            events: EventBus::new(),
            executions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register (or overwrite) a handler for a node type tag
    pub fn register_handler(&self, tag: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        self.handlers.register(tag, handler);
    }

    /// Subscribe a listener to every event this engine emits
    pub fn on_event<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    /// Run a graph to a terminal state.
    ///
    /// The variable bag is seeded from the graph's own variables overlaid
    /// with `initial`. Traversal is strictly sequential depth-first from the
    /// start node; a single node failure aborts the rest.
    pub async fn execute(
        &self,
        graph: &Graph,
        initial: HashMap<String, Value>,
    ) -> ExecutionState {
        let mut variables = graph.variables.clone();
        variables.extend(initial);

        let state = ExecutionState::new(&graph.id, variables);
        let execution_id = state.id.clone();
        let state = Arc::new(RwLock::new(state));
        self.executions
            .write()
            .await
            .insert(execution_id.clone(), Arc::clone(&state));

        log::info!("Execution {} started for graph '{}'", execution_id, graph.name);
        self.events.emit(
            ExecutionEvent::new(EventKind::Start, &execution_id)
                .with_payload(json!({"graph_id": graph.id, "name": graph.name})),
        );

        if graph.nodes.is_empty() {
            return self
                .finish_error(&state, &execution_id, EngineError::EmptyGraph.to_string())
                .await;
        }

        // Adjacency resolved once per execution, edge declaration order kept
        let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &graph.edges {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }

        // The start marker is a convenience tie-break, not a requirement
        let start = graph
            .nodes
            .iter()
            .find(|n| n.node_type == START_TYPE)
            .unwrap_or(&graph.nodes[0]);

        let ctx = NodeContext::new(&execution_id, Arc::clone(&state), self.events.clone());
        let outcome = self
            .visit(graph, &adjacency, &start.id, &state, &execution_id, &ctx)
            .await;

        match outcome {
            Ok(()) => {
                state.write().await.complete();
                log::info!("Execution {} completed", execution_id);
                self.events
                    .emit(ExecutionEvent::new(EventKind::Complete, &execution_id));
                state.read().await.clone()
            }
            Err(err) => {
                self.finish_error(&state, &execution_id, err.to_string())
                    .await
            }
        }
    }

    /// Advisory pause: flips a Running execution to Paused. The traversal
    /// loop never consults this flag, so in-flight work continues.
    pub async fn pause(&self, execution_id: &str) {
        let executions = self.executions.read().await;
        match executions.get(execution_id) {
            Some(state) => {
                let mut state = state.write().await;
                if state.status == ExecutionStatus::Running {
                    state.status = ExecutionStatus::Paused;
                    log::info!("Execution {} paused", execution_id);
                }
            }
            None => log::warn!("Pause requested for unknown execution {}", execution_id),
        }
    }

    /// Cancellation bookkeeping: marks a Running or Paused execution as
    /// failed. Does not interrupt an in-flight handler, which may still
    /// mutate the state on its own schedule.
    pub async fn cancel(&self, execution_id: &str) {
        let executions = self.executions.read().await;
        match executions.get(execution_id) {
            Some(state) => {
                let mut state = state.write().await;
                if matches!(
                    state.status,
                    ExecutionStatus::Running | ExecutionStatus::Paused
                ) {
                    state.fail("Cancelled by user");
                    log::info!("Execution {} cancelled", execution_id);
                }
            }
            None => log::warn!("Cancel requested for unknown execution {}", execution_id),
        }
    }

    /// The live state for an execution id. The same object the engine
    /// mutates, so repeated reads observe in-flight progress.
    pub async fn get_execution(&self, execution_id: &str) -> Option<Arc<RwLock<ExecutionState>>> {
        self.executions.read().await.get(execution_id).cloned()
    }

    fn visit<'a>(
        &'a self,
        graph: &'a Graph,
        adjacency: &'a HashMap<&'a str, Vec<&'a str>>,
        node_id: &'a str,
        state: &'a Arc<RwLock<ExecutionState>>,
        execution_id: &'a str,
        ctx: &'a NodeContext,
    ) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            // At most one result per node per run; joins and cycles stop here
            if state.read().await.results.contains_key(node_id) {
                return Ok(());
            }

            let node = match graph.node(node_id) {
                Some(node) => node,
                // Unreachable on validated graphs
                None => return Ok(()),
            };

            let inputs = state.read().await.merged_inputs();
            self.events
                .emit(ExecutionEvent::new(EventKind::NodeStart, execution_id).with_node(node_id));

            let started = Instant::now();
            let handler = match self.handlers.get(&node.node_type) {
                Some(handler) => handler,
                None => {
                    let err = EngineError::HandlerNotFound(node.node_type.clone());
                    self.record_node_error(state, execution_id, node_id, &err.to_string(), started)
                        .await;
                    return Err(err);
                }
            };

            match handler.execute(node, &inputs, ctx).await {
                Ok(output) => {
                    let result = NodeResult::success(node_id, output.clone(), started.elapsed());
                    state
                        .write()
                        .await
                        .results
                        .insert(node_id.to_string(), result);
                    self.events.emit(
                        ExecutionEvent::new(EventKind::NodeComplete, execution_id)
                            .with_node(node_id)
                            .with_payload(output),
                    );

                    // Every successor in edge order; a conditional's selected
                    // branch is reported but never filters the traversal
                    if let Some(successors) = adjacency.get(node_id) {
                        for successor in successors {
                            self.visit(graph, adjacency, successor, state, execution_id, ctx)
                                .await?;
                        }
                    }
                    Ok(())
                }
                Err(err) => {
                    let message = err.to_string();
                    self.record_node_error(state, execution_id, node_id, &message, started)
                        .await;
                    Err(EngineError::node_failed(node_id, message))
                }
            }
        }
        .boxed()
    }

    async fn record_node_error(
        &self,
        state: &Arc<RwLock<ExecutionState>>,
        execution_id: &str,
        node_id: &str,
        message: &str,
        started: Instant,
    ) {
        log::error!("Node {} failed: {}", node_id, message);
        let result = NodeResult::failure(node_id, message, started.elapsed());
        state
            .write()
            .await
            .results
            .insert(node_id.to_string(), result);
        self.events.emit(
            ExecutionEvent::new(EventKind::NodeError, execution_id)
                .with_node(node_id)
                .with_payload(Value::String(message.to_string())),
        );
    }

    async fn finish_error(
        &self,
        state: &Arc<RwLock<ExecutionState>>,
        execution_id: &str,
        message: String,
    ) -> ExecutionState {
        log::error!("Execution {} failed: {}", execution_id, message);
        state.write().await.fail(message.clone());
        self.events.emit(
            ExecutionEvent::new(EventKind::Error, execution_id)
                .with_payload(Value::String(message)),
        );
        state.read().await.clone()
    }
}

impl Default for FlowEngine {
    fn default() -> Self {
        Self::new()
    }
}
