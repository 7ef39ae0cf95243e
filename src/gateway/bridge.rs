// SPDX-License-Identifier: MIT

//! Autonomous-coding-runtime bridge
//!
//! [ProcessRuntime] hands a free-text task to a local agent CLI and waits for
//! it with a bounded timeout. Where no such CLI exists the spawn fails with
//! [RuntimeError::Unavailable] and the agent handler degrades to a simulated
//! result instead of failing the execution.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::RuntimeError;

/// Result of one delegated task
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Call contract the engine expects from the coding runtime
#[async_trait]
pub trait CodingRuntime: Send + Sync {
    /// Run a free-text task, waiting at most `timeout` (falling back to the
    /// implementation's own bound when `None`).
    async fn run_task(
        &self,
        task: &str,
        timeout: Option<Duration>,
    ) -> Result<TaskReport, RuntimeError>;
}

/// How to reach the local agent CLI
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            args: vec!["-p".to_string()],
            timeout: Duration::from_secs(300),
        }
    }
}

impl BridgeConfig {
    /// Build a config from the environment, falling back to defaults.
    ///
    /// `FLOWRUN_AGENT_CMD` overrides the command line (whitespace-split),
    /// `FLOWRUN_AGENT_TIMEOUT_SECS` the bounded wait.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(cmd) = std::env::var("FLOWRUN_AGENT_CMD") {
            let mut parts = cmd.split_whitespace().map(str::to_string);
            if let Some(command) = parts.next() {
                config.command = command;
                config.args = parts.collect();
            }
        }

        if let Some(secs) = std::env::var("FLOWRUN_AGENT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }
}

/// Bridge that spawns the configured agent CLI per task
pub struct ProcessRuntime {
    config: BridgeConfig,
}

impl ProcessRuntime {
    pub fn new(config: BridgeConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(BridgeConfig::from_env())
    }
}

#[async_trait]
impl CodingRuntime for ProcessRuntime {
    async fn run_task(
        &self,
        task: &str,
        timeout: Option<Duration>,
    ) -> Result<TaskReport, RuntimeError> {
        let timeout = timeout.unwrap_or(self.config.timeout);

        log::info!(
            "Delegating task to '{}' (timeout {}s)",
            self.config.command,
            timeout.as_secs()
        );

        // kill_on_drop so a timed-out child is reaped, not orphaned
        let child = Command::new(&self.config.command)
            .args(&self.config.args)
            .arg(task)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(RuntimeError::Unavailable(format!(
                    "command '{}' not found",
                    self.config.command
                )));
            }
            Err(err) => return Err(err.into()),
        };

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(RuntimeError::Timeout(timeout.as_secs())),
        };

        Ok(TaskReport {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Always-degraded bridge used in tests and offline demos
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedRuntime;

#[async_trait]
impl CodingRuntime for SimulatedRuntime {
    async fn run_task(
        &self,
        task: &str,
        _timeout: Option<Duration>,
    ) -> Result<TaskReport, RuntimeError> {
        Ok(TaskReport {
            success: true,
            stdout: format!("[simulated] completed task: {}", task),
            stderr: String::new(),
        })
    }
}
