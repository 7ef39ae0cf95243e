// SPDX-License-Identifier: MIT

//! Built-in node handlers
//!
//! Five handlers are pre-registered by the engine: the start/end pass-through
//! markers, the prompt node (text-generation gateway), the agent node
//! (coding-runtime bridge with a simulated degraded mode) and the conditional
//! node. The conditional handler reports which branch it selected but does
//! not restrict traversal; the engine visits every outgoing edge either way.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use super::conditions;
use super::context::NodeContext;
use super::registry::NodeHandler;
use crate::gateway::bridge::CodingRuntime;
use crate::gateway::{ChatMessage, GenerationParams, TextGateway};
use crate::graph::Node;

/// Type tag of the start marker node
pub const START_TYPE: &str = "start";
/// Type tag of the end marker node
pub const END_TYPE: &str = "end";
/// Type tag of the text-generation node
pub const PROMPT_TYPE: &str = "prompt";
/// Type tag of the sub-agent delegation node
pub const AGENT_TYPE: &str = "agent";
/// Type tag of the conditional node
pub const CONDITION_TYPE: &str = "condition";

/// Render `{{key}}` placeholders from the merged input map.
///
/// Keys may be dot paths; unresolved placeholders are left intact.
pub fn render_template(template: &str, inputs: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let key = after[..close].trim();
                match conditions::lookup_path(inputs, key) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push_str("{{");
                        out.push_str(&after[..close]);
                        out.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// No-op start marker
pub struct StartHandler;

#[async_trait]
impl NodeHandler for StartHandler {
    async fn execute(
        &self,
        _node: &Node,
        _inputs: &Value,
        _ctx: &NodeContext,
    ) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(json!({}))
    }
}

/// No-op end/pass-through marker
pub struct EndHandler;

#[async_trait]
impl NodeHandler for EndHandler {
    async fn execute(
        &self,
        _node: &Node,
        _inputs: &Value,
        _ctx: &NodeContext,
    ) -> Result<Value, Box<dyn Error + Send + Sync>> {
        Ok(json!({}))
    }
}

/// Text-generation node: renders the prompt and calls the gateway.
///
/// Any gateway failure fails the node and with it the execution.
pub struct PromptHandler {
    gateway: Arc<dyn TextGateway>,
}

impl PromptHandler {
    pub fn new(gateway: Arc<dyn TextGateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl NodeHandler for PromptHandler {
    async fn execute(
        &self,
        node: &Node,
        inputs: &Value,
        _ctx: &NodeContext,
    ) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let template = node.data.get("prompt").and_then(Value::as_str).unwrap_or("");
        let prompt = render_template(template, inputs);

        let mut messages = Vec::new();
        if let Some(system) = node.data.get("system").and_then(Value::as_str) {
            messages.push(ChatMessage::new("system", system));
        }
        messages.push(ChatMessage::new("user", prompt));

        let params = GenerationParams {
            temperature: node
                .data
                .get("temperature")
                .and_then(Value::as_f64)
                .map(|v| v as f32),
            max_tokens: node
                .data
                .get("max_tokens")
                .and_then(Value::as_u64)
                .map(|v| v as u32),
            ..Default::default()
        };

        let generation = self.gateway.generate(&messages, &params).await?;
        log::debug!(
            "Node {} generated {} completion tokens",
            node.id,
            generation.usage.completion_tokens
        );

        Ok(json!({
            "text": generation.text,
            "usage": {
                "prompt_tokens": generation.usage.prompt_tokens,
                "completion_tokens": generation.usage.completion_tokens,
            },
        }))
    }
}

/// Sub-agent delegation node: hands the task to the coding-runtime bridge.
///
/// An unavailable bridge degrades to a simulated result; a timed-out or
/// otherwise failed delegation fails the node.
pub struct AgentTaskHandler {
    runtime: Arc<dyn CodingRuntime>,
}

impl AgentTaskHandler {
    pub fn new(runtime: Arc<dyn CodingRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl NodeHandler for AgentTaskHandler {
    async fn execute(
        &self,
        node: &Node,
        inputs: &Value,
        _ctx: &NodeContext,
    ) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let template = node.data.get("task").and_then(Value::as_str).unwrap_or("");
        let task = render_template(template, inputs);
        let timeout = node
            .data
            .get("timeout_secs")
            .and_then(Value::as_u64)
            .map(Duration::from_secs);

        match self.runtime.run_task(&task, timeout).await {
            Ok(report) => Ok(json!({
                "success": report.success,
                "stdout": report.stdout,
                "stderr": report.stderr,
            })),
            Err(crate::error::RuntimeError::Unavailable(reason)) => {
                log::warn!(
                    "Coding runtime unavailable for node {} ({}), returning simulated result",
                    node.id,
                    reason
                );
                Ok(json!({
                    "success": true,
                    "stdout": format!("[simulated] completed task: {}", task),
                    "stderr": "",
                    "simulated": true,
                }))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Conditional node: evaluates branch conditions in declaration order and
/// reports the first match as `selected_branch`.
pub struct ConditionHandler;

#[async_trait]
impl NodeHandler for ConditionHandler {
    async fn execute(
        &self,
        node: &Node,
        inputs: &Value,
        _ctx: &NodeContext,
    ) -> Result<Value, Box<dyn Error + Send + Sync>> {
        let mut selected = None;

        if let Some(branches) = node.data.get("conditions").and_then(Value::as_array) {
            for (index, branch) in branches.iter().enumerate() {
                let branch_id = branch
                    .get("id")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("branch-{}", index + 1));
                let when = branch.get("when").and_then(Value::as_str).unwrap_or("true");

                if conditions::matches(when, inputs) {
                    selected = Some(branch_id);
                    break;
                }
            }
        }

        let selected = selected
            .or_else(|| {
                node.data
                    .get("default")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| "false".to_string());

        log::debug!("Node {} selected branch '{}'", node.id, selected);

        Ok(json!({ "selected_branch": selected }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::EventBus;
    use crate::engine::state::ExecutionState;
    use crate::error::RuntimeError;
    use crate::gateway::bridge::{SimulatedRuntime, TaskReport};
    use crate::gateway::EchoGateway;
    use crate::graph::Position;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    fn node(node_type: &str, data: Value) -> Node {
        Node {
            id: "n1".to_string(),
            node_type: node_type.to_string(),
            label: String::new(),
            position: Position::default(),
            data,
        }
    }

    fn context() -> NodeContext {
        let state = ExecutionState::new("g1", HashMap::new());
        NodeContext::new("x1", Arc::new(RwLock::new(state)), EventBus::new())
    }

    #[test]
    fn test_render_template() {
        let inputs = json!({"topic": "parsers", "draft": {"text": "ok"}});
        assert_eq!(
            render_template("Write about {{topic}}", &inputs),
            "Write about parsers"
        );
        assert_eq!(
            render_template("Previous: {{draft.text}}", &inputs),
            "Previous: ok"
        );
        // Unknown keys stay intact, dangling braces are literal
        assert_eq!(
            render_template("{{missing}} and {{", &inputs),
            "{{missing}} and {{"
        );
    }

    #[test]
    fn test_render_template_non_string_values() {
        let inputs = json!({"count": 3});
        assert_eq!(render_template("got {{count}}", &inputs), "got 3");
    }

    #[tokio::test]
    async fn test_start_and_end_are_noops() {
        let ctx = context();
        let start = StartHandler
            .execute(&node(START_TYPE, json!({})), &json!({}), &ctx)
            .await
            .unwrap();
        let end = EndHandler
            .execute(&node(END_TYPE, json!({})), &json!({}), &ctx)
            .await
            .unwrap();
        assert_eq!(start, json!({}));
        assert_eq!(end, json!({}));
    }

    #[tokio::test]
    async fn test_prompt_handler_interpolates_and_reports_usage() {
        let handler = PromptHandler::new(Arc::new(EchoGateway::new()));
        let prompt_node = node(
            PROMPT_TYPE,
            json!({"prompt": "Summarize {{topic}}", "system": "Be terse."}),
        );
        let inputs = json!({"topic": "the build"});

        let output = handler.execute(&prompt_node, &inputs, &context()).await.unwrap();
        assert_eq!(output["text"], json!("Summarize the build"));
        assert!(output["usage"]["prompt_tokens"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_agent_handler_uses_bridge_report() {
        let handler = AgentTaskHandler::new(Arc::new(SimulatedRuntime));
        let agent_node = node(AGENT_TYPE, json!({"task": "fix {{target}}"}));

        let output = handler
            .execute(&agent_node, &json!({"target": "the tests"}), &context())
            .await
            .unwrap();
        assert_eq!(output["success"], json!(true));
        assert!(output["stdout"].as_str().unwrap().contains("fix the tests"));
    }

    /// Bridge that always reports itself unreachable
    struct UnreachableRuntime;

    #[async_trait]
    impl CodingRuntime for UnreachableRuntime {
        async fn run_task(
            &self,
            _task: &str,
            _timeout: Option<Duration>,
        ) -> Result<TaskReport, RuntimeError> {
            Err(RuntimeError::Unavailable("no bridge here".to_string()))
        }
    }

    /// Bridge that always times out
    struct StalledRuntime;

    #[async_trait]
    impl CodingRuntime for StalledRuntime {
        async fn run_task(
            &self,
            _task: &str,
            _timeout: Option<Duration>,
        ) -> Result<TaskReport, RuntimeError> {
            Err(RuntimeError::Timeout(5))
        }
    }

    #[tokio::test]
    async fn test_agent_handler_falls_back_when_unavailable() {
        let handler = AgentTaskHandler::new(Arc::new(UnreachableRuntime));
        let agent_node = node(AGENT_TYPE, json!({"task": "deploy"}));

        let output = handler.execute(&agent_node, &json!({}), &context()).await.unwrap();
        assert_eq!(output["simulated"], json!(true));
        assert!(output["stdout"].as_str().unwrap().contains("deploy"));
    }

    #[tokio::test]
    async fn test_agent_handler_propagates_timeout() {
        let handler = AgentTaskHandler::new(Arc::new(StalledRuntime));
        let agent_node = node(AGENT_TYPE, json!({"task": "slow thing"}));

        let result = handler.execute(&agent_node, &json!({}), &context()).await;
        let message = result.unwrap_err().to_string();
        assert!(message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_condition_handler_selects_first_match() {
        let cond_node = node(
            CONDITION_TYPE,
            json!({"conditions": [
                {"id": "reject", "when": "score < 5"},
                {"id": "approve", "when": "score >= 5"},
            ]}),
        );

        let output = ConditionHandler
            .execute(&cond_node, &json!({"score": 8}), &context())
            .await
            .unwrap();
        assert_eq!(output["selected_branch"], json!("approve"));
    }

    #[tokio::test]
    async fn test_condition_handler_falls_back_to_default() {
        let cond_node = node(
            CONDITION_TYPE,
            json!({
                "conditions": [{"id": "hit", "when": "flag == true"}],
                "default": "miss",
            }),
        );

        let output = ConditionHandler
            .execute(&cond_node, &json!({"flag": false}), &context())
            .await
            .unwrap();
        assert_eq!(output["selected_branch"], json!("miss"));
    }

    #[tokio::test]
    async fn test_condition_handler_without_conditions_reports_false() {
        let cond_node = node(CONDITION_TYPE, json!({}));
        let output = ConditionHandler
            .execute(&cond_node, &json!({}), &context())
            .await
            .unwrap();
        assert_eq!(output["selected_branch"], json!("false"));
    }
}
