// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The RPC server: an accept loop over a Unix domain socket that
//! spawns one handler task per connection. Each handler reads exactly one
//! request line, dispatches it, writes exactly one response line, and the
//! connection closes — there is no pipelining to reason about.
//!
//! Handlers that both mutate state and emit a trajectory event call the
//! State Store operation, let it return (which drops the store's internal
//! mutex), and only then log — never while the state lock is held
//! (release-then-log).

use crate::env;
use crate::error::DispatchError;
use crate::exec_gate::is_git_mutation;
use crate::plan::PlanParser;
use crate::protocol::{read_request, write_response, Request, Response};
use crate::runtime::{ExecRequest, Runtime};
use crate::store::StateStore;
use crate::trajectory::Trajectory;
use harness_core::{Clock, WorkerId};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Everything a request handler needs, shared across every connection.
pub struct Ctx<C: Clock> {
    pub store: Arc<StateStore<C>>,
    pub trajectory: Arc<Trajectory>,
    pub runtime: Arc<dyn Runtime>,
    pub plan_parser: Arc<dyn PlanParser>,
    pub worktree: PathBuf,
    pub clock: C,
    pub pid: u32,
    pub shutdown: Arc<Notify>,
    /// Set once a `shutdown` request has been handled, so the accept loop
    /// can stop spawning new handlers once the pending ones drain.
    pub shutting_down: AtomicBool,
}

/// Accepts connections on `listener` and spawns one handler task per
/// connection until told to stop.
pub struct Listener {
    listener: UnixListener,
}

impl Listener {
    pub fn new(listener: UnixListener) -> Self {
        Self { listener }
    }

    /// Serve until `ctx.shutdown` fires.
    pub async fn run<C: Clock + 'static>(self, ctx: Arc<Ctx<C>>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            if ctx.shutting_down.load(Ordering::Acquire) {
                                continue;
                            }
                            let ctx = Arc::clone(&ctx);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, &ctx).await {
                                    log_connection_error(e);
                                }
                            });
                        }
                        Err(e) => error!(error = %e, "accept error"),
                    }
                }
                _ = ctx.shutdown.notified() => {
                    info!("listener stopping");
                    return;
                }
            }
        }
    }
}

fn log_connection_error(e: DispatchError) {
    match e {
        DispatchError::Protocol(crate::error::ProtocolError::ConnectionClosed) => {
            debug!("client disconnected before sending a request");
        }
        other => warn!(error = %other, "connection error"),
    }
}

async fn handle_connection<C: Clock + 'static>(
    stream: UnixStream,
    ctx: &Ctx<C>,
) -> Result<(), DispatchError> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request = match read_request(&mut reader).await {
        Ok(request) => request,
        Err(crate::error::ProtocolError::ConnectionClosed) => return Ok(()),
        Err(e) => {
            let response = Response::error(e.to_string());
            write_response(&mut write_half, &response).await?;
            return Ok(());
        }
    };

    if matches!(request, Request::Status { .. }) {
        debug!(?request, "received request");
    } else {
        info!(?request, "received request");
    }

    let response = match dispatch(request, ctx).await {
        Ok(response) => response,
        Err(e) => Response::error(e.to_string()),
    };

    write_response(&mut write_half, &response).await?;
    write_half.shutdown().await.ok();
    Ok(())
}

/// Dispatch one decoded, validated request to its handler.
async fn dispatch<C: Clock + 'static>(
    request: Request,
    ctx: &Ctx<C>,
) -> Result<Response, DispatchError> {
    match request {
        Request::Ping => Ok(Response::ok(serde_json::json!({
            "running": true,
            "pid": ctx.pid,
        }))),

        Request::Shutdown => {
            ctx.shutting_down.store(true, Ordering::Release);
            ctx.shutdown.notify_waiters();
            Ok(Response::ok(serde_json::json!({ "shutdown": true })))
        }

        Request::GetState => {
            let state = ctx.store.load()?;
            Ok(Response::ok(state))
        }

        Request::Status { event_count } => Ok(handle_status(ctx, event_count)?),

        Request::UpdateState { updates } => {
            let state = ctx.store.update(&updates)?;
            Ok(Response::ok(state))
        }

        Request::Git { args, cwd } => handle_git(ctx, args, cwd).await,

        Request::TaskClaim { worker_id } => handle_task_claim(ctx, worker_id).await,

        Request::TaskComplete { task_id, worker_id } => {
            handle_task_complete(ctx, task_id, worker_id).await
        }

        Request::Exec { args, timeout, exclusive, cwd, env } => {
            handle_exec(ctx, args, timeout, exclusive, cwd, env).await
        }

        Request::PlanImport { content } => handle_plan_import(ctx, content).await,

        Request::PlanReset => {
            ctx.store.reset()?;
            ctx.trajectory.log(serde_json::json!({ "event_type": "plan_reset" }))?;
            Ok(Response::ok(serde_json::json!({ "reset": true })))
        }

        Request::ContextPreserve => handle_context_preserve(ctx),
    }
}

fn handle_status<C: Clock>(ctx: &Ctx<C>, event_count: usize) -> Result<Response, DispatchError> {
    let state = ctx.store.load()?;
    let (summary, tasks, active_workers, active) = match &state {
        Some(state) => {
            let mut summary = serde_json::Map::new();
            let total = state.tasks.len();
            let completed =
                state.tasks.values().filter(|t| t.status == harness_core::TaskStatus::Completed).count();
            let running =
                state.tasks.values().filter(|t| t.status == harness_core::TaskStatus::Running).count();
            let pending =
                state.tasks.values().filter(|t| t.status == harness_core::TaskStatus::Pending).count();
            let failed =
                state.tasks.values().filter(|t| t.status == harness_core::TaskStatus::Failed).count();
            summary.insert("total".to_string(), total.into());
            summary.insert("completed".to_string(), completed.into());
            summary.insert("running".to_string(), running.into());
            summary.insert("pending".to_string(), pending.into());
            summary.insert("failed".to_string(), failed.into());

            let active_workers: std::collections::BTreeSet<&str> = state
                .tasks
                .values()
                .filter(|t| t.status == harness_core::TaskStatus::Running)
                .filter_map(|t| t.claimed_by.as_deref())
                .collect();

            (
                serde_json::Value::Object(summary),
                serde_json::to_value(&state.tasks)?,
                serde_json::to_value(active_workers)?,
                true,
            )
        }
        None => (
            serde_json::json!({ "total": 0, "completed": 0, "running": 0, "pending": 0, "failed": 0 }),
            serde_json::json!({}),
            serde_json::json!([]),
            false,
        ),
    };

    let events = ctx.trajectory.tail(event_count)?;
    Ok(Response::ok(serde_json::json!({
        "active": active,
        "summary": summary,
        "tasks": tasks,
        "events": events,
        "active_workers": active_workers,
    })))
}

async fn handle_git<C: Clock>(
    ctx: &Ctx<C>,
    args: Vec<String>,
    cwd: Option<PathBuf>,
) -> Result<Response, DispatchError> {
    let read_only = !is_git_mutation(&args);
    let mut full_args = vec!["git".to_string()];
    full_args.extend(args);

    let request = ExecRequest {
        args: full_args,
        cwd: Some(cwd.unwrap_or_else(|| ctx.worktree.clone())),
        env: Default::default(),
        timeout: None,
        exclusive: !read_only,
    };
    let result = ctx.runtime.execute(request).await?;
    Ok(Response::ok(result))
}

async fn handle_task_claim<C: Clock>(ctx: &Ctx<C>, worker_id: String) -> Result<Response, DispatchError> {
    let worker = WorkerId::new(worker_id.clone());
    let result = ctx.store.claim_task(&worker)?;

    ctx.trajectory.log(serde_json::json!({
        "event_type": "task_claim",
        "worker_id": worker_id,
        "task_id": result.task.as_ref().map(|t| t.id.clone()),
        "is_retry": result.is_retry,
        "is_reclaim": result.is_reclaim,
    }))?;

    Ok(Response::ok(serde_json::json!({
        "task": result.task,
        "is_retry": result.is_retry,
        "is_reclaim": result.is_reclaim,
    })))
}

async fn handle_task_complete<C: Clock>(
    ctx: &Ctx<C>,
    task_id: String,
    worker_id: String,
) -> Result<Response, DispatchError> {
    let worker = WorkerId::new(worker_id.clone());
    ctx.store.complete_task(&task_id, &worker)?;

    ctx.trajectory.log(serde_json::json!({
        "event_type": "task_complete",
        "task_id": task_id,
        "worker_id": worker_id,
    }))?;

    Ok(Response::ok(serde_json::json!({ "task_id": task_id })))
}

async fn handle_exec<C: Clock>(
    ctx: &Ctx<C>,
    args: Vec<String>,
    timeout: Option<f64>,
    exclusive: bool,
    cwd: Option<PathBuf>,
    env: std::collections::HashMap<String, String>,
) -> Result<Response, DispatchError> {
    let request = ExecRequest {
        args: args.clone(),
        cwd: cwd.or_else(|| Some(ctx.worktree.clone())),
        env,
        timeout: timeout.map(Duration::from_secs_f64),
        exclusive,
    };

    let start = Instant::now();
    let result = ctx.runtime.execute(request).await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    ctx.trajectory.log(serde_json::json!({
        "event_type": "exec",
        "args": args,
        "exclusive": exclusive,
        "returncode": result.returncode,
        "duration_ms": duration_ms,
    }))?;

    Ok(Response::ok(result))
}

async fn handle_plan_import<C: Clock>(ctx: &Ctx<C>, content: String) -> Result<Response, DispatchError> {
    let parsed = ctx.plan_parser.parse(&content)?;
    let state = parsed.to_workflow_state()?;
    let saved = ctx.store.save(state)?;

    ctx.trajectory.log(serde_json::json!({
        "event_type": "plan_import",
        "goal": parsed.goal,
        "task_count": parsed.tasks.len(),
    }))?;

    Ok(Response::ok(saved))
}

/// Writes a plain-text progress summary under `<worktree>/.claude/progress.txt`:
/// task counts and the ids of completed tasks.
fn handle_context_preserve<C: Clock>(ctx: &Ctx<C>) -> Result<Response, DispatchError> {
    let state = ctx.store.load()?.unwrap_or_default();
    let completed: Vec<&str> = state
        .tasks
        .values()
        .filter(|t| t.status == harness_core::TaskStatus::Completed)
        .map(|t| t.id.as_str())
        .collect();

    let mut body = String::new();
    body.push_str(&format!("total tasks: {}\n", state.tasks.len()));
    body.push_str(&format!("completed tasks: {}\n", completed.len()));
    body.push_str(&format!("completed ids: {}\n", completed.join(", ")));

    let path = env::progress_path(&ctx.worktree);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, body)?;

    Ok(Response::ok(serde_json::json!({ "written": true })))
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
