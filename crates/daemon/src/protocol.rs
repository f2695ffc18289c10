// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed wire protocol: a tagged request union discriminated
//! on `command`, a two-variant `Result`-shaped response, and newline-delimited
//! JSON framing over the connection.
//!
//! The framing is "one JSON value per line": each connection reads one
//! request line, writes one response line, and closes.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

fn default_event_count() -> usize {
    10
}

/// One incoming request, tagged on `command`. `deny_unknown_fields`
/// gives strict-schema rejection of unrecognized fields inside a known
/// command; an unrecognized `command` value itself fails to deserialize at
/// all, which is rejection at decode time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case", deny_unknown_fields)]
pub enum Request {
    Ping,
    Shutdown,
    GetState,
    Status {
        #[serde(default = "default_event_count")]
        event_count: usize,
    },
    UpdateState {
        updates: serde_json::Value,
    },
    Git {
        args: Vec<String>,
        #[serde(default)]
        cwd: Option<PathBuf>,
    },
    TaskClaim {
        worker_id: String,
    },
    TaskComplete {
        task_id: String,
        worker_id: String,
    },
    Exec {
        args: Vec<String>,
        #[serde(default)]
        timeout: Option<f64>,
        #[serde(default)]
        exclusive: bool,
        #[serde(default)]
        cwd: Option<PathBuf>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    PlanImport {
        content: String,
    },
    PlanReset,
    ContextPreserve,
}

impl Request {
    /// Constraints `serde` can't express alone: non-empty
    /// trimmed strings, non-negative counts, positive timeouts, non-empty
    /// objects. Called right after decode, before dispatch.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        fn non_empty(field: &str, value: &str) -> Result<(), ProtocolError> {
            if value.trim().is_empty() {
                return Err(ProtocolError::Validation(format!("`{field}` must not be empty")));
            }
            Ok(())
        }

        match self {
            Request::UpdateState { updates } => {
                let is_empty_object = updates.as_object().is_some_and(|m| m.is_empty());
                if updates.is_null() || is_empty_object {
                    return Err(ProtocolError::Validation("`updates` must not be empty".to_string()));
                }
                Ok(())
            }
            Request::TaskClaim { worker_id } => non_empty("worker_id", worker_id),
            Request::TaskComplete { task_id, worker_id } => {
                non_empty("task_id", task_id)?;
                non_empty("worker_id", worker_id)
            }
            Request::Exec { timeout, .. } => {
                if let Some(t) = timeout {
                    if *t <= 0.0 {
                        return Err(ProtocolError::Validation(
                            "`timeout` must be greater than 0".to_string(),
                        ));
                    }
                }
                Ok(())
            }
            Request::PlanImport { content } => non_empty("content", content),
            Request::Ping
            | Request::Shutdown
            | Request::GetState
            | Request::Status { .. }
            | Request::Git { .. }
            | Request::PlanReset
            | Request::ContextPreserve => Ok(()),
        }
    }
}

/// The `Result` ADT every response is shaped as.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { data: serde_json::Value },
    Error { message: String },
}

impl Response {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Response::Ok { data },
            Err(e) => Response::Error { message: format!("failed to encode response: {e}") },
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Response::Error { message: message.to_string() }
    }
}

/// Read exactly one line, decode it as a `Request`, and validate it. Returns
/// [`ProtocolError::ConnectionClosed`] on EOF before any bytes are read.
pub async fn read_request<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Request, ProtocolError> {
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(ProtocolError::ConnectionClosed);
    }
    let request: Request = serde_json::from_str(line.trim_end())?;
    request.validate()?;
    Ok(request)
}

/// Write exactly one response line, newline-terminated, and flush.
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
) -> Result<(), ProtocolError> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
