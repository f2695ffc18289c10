// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution runtime contract and its one concrete
//! implementation, [`LocalRuntime`]: spawns commands via
//! `tokio::process::Command`, timing via
//! `Instant`, exclusive execution routed through the [`ExecutionGate`].

use crate::env;
use crate::error::RuntimeError;
use crate::exec_gate::ExecutionGate;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Result of an `execute` call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExecResult {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal_name: Option<String>,
    pub duration_ms: u64,
}

/// Parameters to one `execute` call.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub exclusive: bool,
}

/// The capability set every execution backend must provide.
#[async_trait::async_trait]
pub trait Runtime: Send + Sync {
    async fn execute(&self, request: ExecRequest) -> Result<ExecResult, RuntimeError>;

    /// Fail fast at startup if a required external tool (git, docker, ...)
    /// is missing.
    async fn check_capabilities(&self) -> Result<(), RuntimeError>;
}

/// Runs commands as local child processes. `exclusive` requests route
/// through the shared [`ExecutionGate`] for the duration of the child
/// process; a `timeout` is enforced with `tokio::time::timeout`,
/// synthesizing `returncode = -15, signal_name = "SIGTERM"` on expiry.
///
/// When `HARNESS_CONTAINER_ID` is set (§6.7), commands are routed through
/// `docker exec` into that container instead of spawned directly, with
/// `cwd` translated from the host's view of the worktree
/// (`HARNESS_HOST_ROOT`) to the container's (`HARNESS_CONTAINER_ROOT`).
pub struct LocalRuntime {
    gate: Arc<ExecutionGate>,
}

impl LocalRuntime {
    pub fn new(gate: Arc<ExecutionGate>) -> Self {
        Self { gate }
    }

    /// Build the child command to run: either the program directly, or,
    /// under a configured container, `docker exec [-w <dir>] [-e K=V ...]
    /// <container_id> <program> <args...>`.
    fn build_command(program: &str, rest: &[String], request: &ExecRequest) -> Command {
        let mut command = match env::container_id() {
            Some(container_id) => {
                let mut command = Command::new("docker");
                command.arg("exec");
                if let Some(cwd) = &request.cwd {
                    command.arg("-w").arg(env::translate_path_for_container(cwd));
                }
                for (key, value) in &request.env {
                    command.arg("-e").arg(format!("{key}={value}"));
                }
                command.arg(&container_id);
                command.arg(program);
                command.args(rest);
                command
            }
            None => {
                let mut command = Command::new(program);
                command.args(rest);
                if let Some(cwd) = &request.cwd {
                    command.current_dir(cwd);
                }
                for (key, value) in &request.env {
                    command.env(key, value);
                }
                command
            }
        };
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());
        command
    }

    async fn run_child(args: &[String], request: &ExecRequest) -> Result<ExecResult, RuntimeError> {
        let Some((program, rest)) = args.split_first() else {
            return Ok(ExecResult {
                returncode: -1,
                stdout: String::new(),
                stderr: "no command given".to_string(),
                signal_name: None,
                duration_ms: 0,
            });
        };

        let mut command = Self::build_command(program, rest, request);
        // A timed-out wait drops the future (and the `Child` it owns) without
        // ever calling `.wait()` again; without this the child survives the
        // timeout as an orphan.
        command.kill_on_drop(true);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RuntimeError::Spawn {
            command: program.clone(),
            source,
        })?;

        let wait = child.wait_with_output();
        let outcome = match request.timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await,
            None => Ok(wait.await),
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(output)) => Ok(ExecResult {
                returncode: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                signal_name: None,
                duration_ms,
            }),
            Ok(Err(source)) => Err(RuntimeError::Spawn {
                command: program.clone(),
                source,
            }),
            Err(_elapsed) => Ok(ExecResult {
                returncode: -15,
                stdout: String::new(),
                stderr: format!("`{program}` timed out after {duration_ms}ms"),
                signal_name: Some("SIGTERM".to_string()),
                duration_ms,
            }),
        }
    }
}

#[async_trait::async_trait]
impl Runtime for LocalRuntime {
    async fn execute(&self, request: ExecRequest) -> Result<ExecResult, RuntimeError> {
        if request.exclusive {
            return self.gate.with_exclusive(Self::run_child(&request.args, &request)).await;
        }
        Self::run_child(&request.args, &request).await
    }

    async fn check_capabilities(&self) -> Result<(), RuntimeError> {
        let output = Command::new("git").arg("--version").output().await;
        match output {
            Ok(status) if status.status.success() => {}
            _ => return Err(RuntimeError::MissingCapability("git".to_string())),
        }

        if env::container_id().is_some() {
            let output = Command::new("docker").arg("--version").output().await;
            match output {
                Ok(status) if status.status.success() => {}
                _ => return Err(RuntimeError::MissingCapability("docker".to_string())),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
