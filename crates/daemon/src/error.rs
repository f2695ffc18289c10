// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed error boundaries for the daemon's subsystems.

use std::path::PathBuf;

/// Errors from the state store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] harness_core::CoreError),

    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("state file {path} contains invalid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the trajectory log.
#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    #[error("failed to append to trajectory file {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read trajectory file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors surfaced at the wire boundary.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed request: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("connection closed before a complete line was read")]
    ConnectionClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid request: {0}")]
    Validation(String),
}

/// Errors from dispatching one decoded request to its handler.
/// Every variant here becomes an `{ "status": "error", "message": ... }`
/// response; none of them cross the wire as a stack trace.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from daemon startup and shutdown.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("another daemon already holds the lock for this worktree")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {path}: {source}")]
    BindFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("runtime capability check failed: {0}")]
    CapabilityCheck(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Errors from the project registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to acquire registry lock at {path}: {source}")]
    LockFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on registry file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry file {path} contains invalid JSON: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from the execution runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("missing required capability: {0}")]
    MissingCapability(String),
}

/// Errors from plan parsing.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no recognized plan in content: {0}")]
    Unrecognized(String),

    #[error("invalid plan JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] harness_core::CoreError),
}
