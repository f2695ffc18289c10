// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `harness`: the CLI front-end for the per-worktree orchestration daemon.
//!
//! External to the core and deliberately thin: every subcommand builds
//! one `Request`, sends it over the daemon's wire protocol, and prints
//! whatever comes back. The heavier `WorkflowState`/`Task` types never
//! leave `harness-daemon` — this crate only ever sees `serde_json::Value`.

mod client;

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use client::DaemonClient;
use harness_daemon::protocol::Request;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

#[derive(Parser)]
#[command(name = "harness", version = VERSION, about = "Client for the harness orchestration daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the daemon is reachable.
    Ping,
    /// Print a status summary and the most recent trajectory events.
    Status {
        /// Number of recent trajectory events to include.
        #[arg(long, default_value_t = 10)]
        event_count: usize,
    },
    /// Print the full workflow state as JSON.
    GetState,
    /// Load a plan document and replace the current workflow state.
    PlanImport {
        /// Path to the plan JSON file; reads stdin if omitted.
        file: Option<PathBuf>,
    },
    /// Clear the current workflow state back to empty.
    PlanReset,
    /// Claim the next runnable task for a worker.
    Claim {
        worker_id: String,
    },
    /// Mark a task complete on behalf of a worker.
    Complete {
        task_id: String,
        worker_id: String,
    },
    /// Run a git command inside the worktree, serialized through the execution gate.
    Git {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run an arbitrary command.
    Exec {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
        /// Serialize this call behind the execution gate.
        #[arg(long)]
        exclusive: bool,
        /// Timeout in seconds before the child is killed.
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Write a progress snapshot to `.claude/progress.txt`.
    ContextPreserve,
    /// Ask the daemon to shut down.
    Shutdown,
    /// Manage the daemon process itself.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

#[derive(Subcommand)]
enum DaemonCommand {
    /// Start the daemon for the current worktree if it isn't already running.
    Start {
        /// Run in the foreground instead of detaching.
        #[arg(long)]
        foreground: bool,
    },
    /// Ask the daemon to shut down.
    Stop,
    /// Report whether the daemon is running.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Ping => {
            let client = connect().await?;
            let data = client.send_data(&Request::Ping).await?;
            print_json(&data)
        }
        Command::Status { event_count } => {
            let client = connect().await?;
            let data = client.send_data(&Request::Status { event_count }).await?;
            print_json(&data)
        }
        Command::GetState => {
            let client = connect().await?;
            let data = client.send_data(&Request::GetState).await?;
            print_json(&data)
        }
        Command::PlanImport { file } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?,
                None => std::io::read_to_string(std::io::stdin())
                    .context("reading plan document from stdin")?,
            };
            let client = connect().await?;
            let data = client.send_data(&Request::PlanImport { content }).await?;
            print_json(&data)
        }
        Command::PlanReset => {
            let client = connect().await?;
            let data = client.send_data(&Request::PlanReset).await?;
            print_json(&data)
        }
        Command::Claim { worker_id } => {
            let client = connect().await?;
            let data = client.send_data(&Request::TaskClaim { worker_id }).await?;
            print_json(&data)
        }
        Command::Complete { task_id, worker_id } => {
            let client = connect().await?;
            let data = client.send_data(&Request::TaskComplete { task_id, worker_id }).await?;
            print_json(&data)
        }
        Command::Git { args } => {
            let client = connect().await?;
            let data = client.send_data(&Request::Git { args, cwd: None }).await?;
            print_json(&data)
        }
        Command::Exec { args, exclusive, timeout } => {
            let client = connect().await?;
            let request = Request::Exec {
                args,
                timeout,
                exclusive,
                cwd: None,
                env: Default::default(),
            };
            let data = client.send_data(&request).await?;
            print_json(&data)
        }
        Command::ContextPreserve => {
            let client = connect().await?;
            let data = client.send_data(&Request::ContextPreserve).await?;
            print_json(&data)
        }
        Command::Shutdown => {
            let client = connect().await?;
            client.send_data(&Request::Shutdown).await?;
            println!("daemon shutting down");
            Ok(())
        }
        Command::Daemon { command } => daemon_command(command).await,
    }
}

async fn daemon_command(command: DaemonCommand) -> Result<()> {
    match command {
        DaemonCommand::Start { foreground } => {
            if foreground {
                let binary = std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(|dir| dir.join("harnessd")))
                    .filter(|p| p.exists())
                    .unwrap_or_else(|| PathBuf::from("harnessd"));
                let status = std::process::Command::new(&binary)
                    .status()
                    .with_context(|| format!("spawning {}", binary.display()))?;
                if !status.success() {
                    bail!("harnessd exited with {status}");
                }
                return Ok(());
            }

            if DaemonClient::connect().await.is_ok() {
                println!("daemon already running");
                return Ok(());
            }
            DaemonClient::connect_or_start().await.map_err(|e| anyhow!("{e}"))?;
            println!("daemon started");
            Ok(())
        }
        DaemonCommand::Stop => {
            let client = match DaemonClient::connect().await {
                Ok(c) => c,
                Err(_) => {
                    println!("daemon not running");
                    return Ok(());
                }
            };
            client.send_data(&Request::Shutdown).await.map_err(|e| anyhow!("{e}"))?;
            println!("daemon stopped");
            Ok(())
        }
        DaemonCommand::Status => match DaemonClient::connect().await {
            Ok(client) => {
                let data = client.send_data(&Request::Ping).await.map_err(|e| anyhow!("{e}"))?;
                print_json(&data)
            }
            Err(_) => {
                println!("daemon not running");
                Ok(())
            }
        },
    }
}

async fn connect() -> Result<DaemonClient> {
    DaemonClient::connect().await.map_err(|e| {
        if e.is_not_running() {
            anyhow!("daemon is not running for this worktree (try `harness daemon start`)")
        } else {
            anyhow!("{e}")
        }
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
