// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! harnessd: the per-worktree orchestration daemon binary.
//!
//! Resolves configuration from the environment, starts the daemon
//! for the current worktree, and serves until a `shutdown` request arrives
//! or the process receives SIGTERM/SIGINT.

use std::sync::Arc;

use harness_core::SystemClock;
use harness_daemon::exec_gate::ExecutionGate;
use harness_daemon::{lifecycle, Config, JsonPlanParser, LifecycleError, LocalRuntime};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("harnessd {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "--help" | "-h" => {
                println!("harnessd {}", env!("CARGO_PKG_VERSION"));
                println!("Per-worktree orchestration daemon. Typically started by the");
                println!("`harness` CLI, not invoked directly.");
                return;
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                std::process::exit(1);
            }
        }
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Exactly one Execution Gate for the process: every exclusive `exec`
    // and git mutation call routes through this single instance via
    // `LocalRuntime`, never a second one constructed elsewhere.
    let gate = Arc::new(ExecutionGate::new());
    let runtime = Arc::new(LocalRuntime::new(gate));
    let plan_parser = Arc::new(JsonPlanParser);

    let daemon = match lifecycle::startup(config.clone(), SystemClock, runtime, plan_parser).await
    {
        Ok(daemon) => daemon,
        Err(LifecycleError::LockFailed(_)) => {
            eprintln!("harnessd is already running for {}", config.worktree.display());
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            std::process::exit(1);
        }
    };

    info!(worktree = %config.worktree.display(), socket = %config.socket_path.display(), "harnessd ready");
    println!("READY");

    let shutdown = daemon.shutdown_handle();
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::process::exit(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            std::process::exit(1);
        }
    };

    let mut run_handle = tokio::spawn(daemon.run());

    tokio::select! {
        result = &mut run_handle => {
            if let Err(e) = result {
                error!(error = %e, "daemon task panicked");
            }
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
            shutdown.notify_waiters();
            let _ = run_handle.await;
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
            shutdown.notify_waiters();
            let _ = run_handle.await;
        }
    }

    info!("daemon stopped");
}
