// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin synchronous-feeling client over the daemon's one-request-per-connection
//! wire protocol: connect, write one JSON line, read one JSON line,
//! disconnect. Deliberately avoids the daemon's `serde`-heavy `WorkflowState`/
//! `Task` types in its own presentation layer — callers get back
//! [`serde_json::Value`] and format it themselves.

use std::path::PathBuf;
use std::time::Duration;

use harness_daemon::protocol::{Request, Response};
use harness_daemon::{env, registry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("daemon is not running (no socket at {path})")]
    NotRunning { path: PathBuf },

    #[error("could not determine the daemon socket path: {0}")]
    NoSocketPath(String),

    #[error("I/O error talking to the daemon: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response from the daemon: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("daemon returned an error: {0}")]
    Remote(String),
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning { .. })
    }
}

/// Resolve the socket path the same way the daemon does:
/// `HARNESS_SOCKET` if set, otherwise `~/.harness/sockets/<hash(worktree)>.sock`.
pub fn socket_path() -> Result<PathBuf, ClientError> {
    if let Some(path) = env::socket_override() {
        return Ok(path);
    }
    let worktree = match env::worktree_override() {
        Some(path) => path,
        None => std::env::current_dir().map_err(|e| ClientError::NoSocketPath(e.to_string()))?,
    };
    let home = env::home_dir()
        .ok_or_else(|| ClientError::NoSocketPath("could not determine home directory".to_string()))?;
    Ok(registry::socket_path(&home, &worktree))
}

pub struct DaemonClient {
    path: PathBuf,
}

impl DaemonClient {
    /// Connect to the already-running daemon for the current worktree.
    pub async fn connect() -> Result<Self, ClientError> {
        let path = socket_path()?;
        if !path.exists() {
            return Err(ClientError::NotRunning { path });
        }
        // Probe the connection eagerly so a stale socket file (daemon crashed
        // without cleaning up) is reported as "not running" rather than as a
        // confusing I/O error on the first real command.
        match UnixStream::connect(&path).await {
            Ok(_) => Ok(Self { path }),
            Err(_) => Err(ClientError::NotRunning { path }),
        }
    }

    /// Connect, starting the daemon in the background first if it isn't
    /// already running.
    pub async fn connect_or_start() -> Result<Self, ClientError> {
        if let Ok(client) = Self::connect().await {
            return Ok(client);
        }

        let binary = find_harnessd_binary();
        std::process::Command::new(&binary).spawn()?;

        let path = socket_path()?;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if path.exists() {
                if let Ok(_stream) = UnixStream::connect(&path).await {
                    return Ok(Self { path });
                }
            }
        }
        Err(ClientError::NotRunning { path })
    }

    /// Send one request and return its decoded response, without unwrapping
    /// the `status: "error"` case — callers that need the raw ADT use this.
    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.path).await?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        write_half.write_all(line.as_bytes()).await?;
        write_half.flush().await?;
        write_half.shutdown().await.ok();

        let mut reader = BufReader::new(read_half);
        let mut response_line = String::new();
        reader.read_line(&mut response_line).await?;
        Ok(serde_json::from_str(response_line.trim_end())?)
    }

    /// Send a request and unwrap the `data` payload, surfacing a
    /// `status: "error"` response as [`ClientError::Remote`].
    pub async fn send_data(&self, request: &Request) -> Result<serde_json::Value, ClientError> {
        match self.send(request).await? {
            Response::Ok { data } => Ok(data),
            Response::Error { message } => Err(ClientError::Remote(message)),
        }
    }
}

/// Locate the `harnessd` binary: next to the running `harness` executable
/// first, falling back to `PATH`.
fn find_harnessd_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("harnessd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("harnessd")
}
