// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! Startup order matters: create directories, acquire the per-worktree
//! singleton lock *before* touching the socket (so a second daemon fails
//! fast rather than racing to bind), fail fast on a missing capability,
//! remove a stale socket, bind, `chmod 0600`, then register with the
//! project registry. Only after all of that does the daemon start serving.

use crate::env;
use crate::error::LifecycleError;
use crate::listener::{Ctx, Listener};
use crate::plan::PlanParser;
use crate::registry::{self, ProjectRegistry};
use crate::runtime::Runtime;
use crate::store::StateStore;
use crate::trajectory::Trajectory;
use chrono::Utc;
use fs2::FileExt;
use harness_core::Clock;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::info;

/// Resolved paths for one daemon instance, one per worktree. All of these
/// are overridable via environment variables, primarily for tests.
#[derive(Debug, Clone)]
pub struct Config {
    pub worktree: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub state_path: PathBuf,
    pub trajectory_path: PathBuf,
    pub registry_path: PathBuf,
}

impl Config {
    /// Resolve configuration from the environment, falling back to
    /// the current directory as the worktree and a hash-derived socket path
    /// registered under `~/.harness`.
    pub fn load() -> Result<Self, LifecycleError> {
        let worktree = match env::worktree_override() {
            Some(path) => path,
            None => std::env::current_dir()?,
        };
        let home = env::home_dir().ok_or(LifecycleError::NoHomeDir)?;

        let socket_path =
            env::socket_override().unwrap_or_else(|| registry::socket_path(&home, &worktree));
        let lock_path = registry::lock_path_for_socket(&socket_path);
        let registry_path =
            env::registry_file_override().unwrap_or_else(|| home.join(".harness").join("registry.json"));

        Ok(Self {
            state_path: env::state_path(&worktree),
            trajectory_path: env::trajectory_path(&worktree),
            worktree,
            socket_path,
            lock_path,
            registry_path,
        })
    }
}

/// A started daemon: its shared request context and the listener ready to
/// `run()`. Dropping this drops the socket's singleton lock file handle,
/// releasing the advisory lock.
pub struct Daemon<C: Clock> {
    pub ctx: Arc<Ctx<C>>,
    pub listener: Listener,
    socket_path: PathBuf,
    _lock_file: fs::File,
}

impl<C: Clock + 'static> Daemon<C> {
    /// Serve until a `shutdown` request is handled, then remove the socket
    /// file.
    pub async fn run(self) {
        self.listener.run(Arc::clone(&self.ctx)).await;
        let _ = fs::remove_file(&self.socket_path);
    }

    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.ctx.shutdown)
    }
}

/// Start the daemon for `config`. Acquires the per-worktree
/// singleton lock non-blocking (a second daemon for the same worktree fails
/// immediately rather than queuing), fails fast if `runtime.check_capabilities()`
/// errors, then binds, `chmod`s, and registers.
pub async fn startup<C: Clock>(
    config: Config,
    clock: C,
    runtime: Arc<dyn Runtime>,
    plan_parser: Arc<dyn PlanParser>,
) -> Result<Daemon<C>, LifecycleError> {
    if let Some(parent) = config.socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let lock_file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    runtime
        .check_capabilities()
        .await
        .map_err(|e| LifecycleError::CapabilityCheck(e.to_string()))?;

    if config.socket_path.exists() {
        fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|source| LifecycleError::BindFailed { path: config.socket_path.clone(), source })?;
    fs::set_permissions(&config.socket_path, fs::Permissions::from_mode(0o600))?;

    let project_registry = ProjectRegistry::new(config.registry_path.clone());
    project_registry.register(&config.worktree, Utc::now())?;

    let store = Arc::new(StateStore::new(config.state_path.clone(), clock.clone()));
    let trajectory = Arc::new(Trajectory::new(config.trajectory_path.clone()));

    let ctx = Arc::new(Ctx {
        store,
        trajectory,
        runtime,
        plan_parser,
        worktree: config.worktree.clone(),
        clock,
        pid: std::process::id(),
        shutdown: Arc::new(Notify::new()),
        shutting_down: AtomicBool::new(false),
    });

    info!(socket = %config.socket_path.display(), worktree = %config.worktree.display(), "daemon listening");

    Ok(Daemon {
        ctx,
        listener: Listener::new(listener),
        socket_path: config.socket_path,
        _lock_file: lock_file,
    })
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
