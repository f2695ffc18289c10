// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The workflow DAG value and the pure functions that operate on it.
//!
//! Nothing in this module touches disk or a lock; `WorkflowState` is a
//! frozen value and every transition below (`claim`, `complete`) returns a
//! new one. The daemon's state store owns the mutex, the persistence, and
//! the trajectory logging around these functions — see the design note on
//! stateless recomputation: keeping indexes out of the value means every
//! `claim` just walks the task map again instead of maintaining a
//! pending-queue or worker->task index that would go stale on every replace.

use crate::error::CoreError;
use crate::task::{Task, TaskStatus};
use crate::worker::WorkerId;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// The authoritative DAG of tasks. Mapping iteration order is insertion
/// order (via `IndexMap`), which is what `claimable_next` walks to find
/// "the first task in mapping order".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowState {
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,
}

/// Outcome of a `claim_task` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimResult {
    pub task: Option<Task>,
    pub is_retry: bool,
    pub is_reclaim: bool,
}

impl ClaimResult {
    fn none() -> Self {
        Self {
            task: None,
            is_retry: false,
            is_reclaim: false,
        }
    }
}

impl WorkflowState {
    /// Build a validated state from a task map (invariants 1-3).
    pub fn new(tasks: IndexMap<String, Task>) -> Result<Self, CoreError> {
        let state = Self { tasks };
        validate_dag(&state)?;
        Ok(state)
    }

    pub fn validate_dag(&self) -> Result<(), CoreError> {
        validate_dag(self)
    }

    pub fn deps_satisfied(&self, task: &Task) -> Result<bool, CoreError> {
        deps_satisfied(self, task)
    }

    pub fn claimable_next(&self, now: DateTime<Utc>) -> Result<Option<&Task>, CoreError> {
        claimable_next(self, now)
    }

    /// Atomically claim a task for `worker_id` as of `now`. An
    /// idempotent re-claim renews the lease of a task the worker already
    /// owns; otherwise the first claimable-next task (pending, or a timed
    /// out running task) is handed out.
    pub fn claim(&self, worker_id: &WorkerId, now: DateTime<Utc>) -> (WorkflowState, ClaimResult) {
        let worker_str = worker_id.as_str();

        if let Some(owned_id) = self.tasks.iter().find_map(|(id, t)| {
            (t.status == TaskStatus::Running && t.claimed_by.as_deref() == Some(worker_str))
                .then(|| id.clone())
        }) {
            let mut new_state = self.clone();
            let mut renewed = None;
            if let Some(task) = new_state.tasks.get_mut(&owned_id) {
                task.started_at = Some(now);
                renewed = Some(task.clone());
            }
            return (
                new_state,
                ClaimResult {
                    task: renewed,
                    is_retry: true,
                    is_reclaim: false,
                },
            );
        }

        let next_id = match claimable_next(self, now) {
            Ok(Some(task)) => task.id.clone(),
            _ => return (self.clone(), ClaimResult::none()),
        };

        let mut new_state = self.clone();
        let mut claimed = None;
        let mut is_reclaim = false;
        if let Some(task) = new_state.tasks.get_mut(&next_id) {
            is_reclaim = task.status == TaskStatus::Running;
            task.status = TaskStatus::Running;
            task.claimed_by = Some(worker_str.to_string());
            task.started_at = Some(now);
            task.completed_at = None;
            claimed = Some(task.clone());
        }

        (
            new_state,
            ClaimResult {
                task: claimed,
                is_retry: false,
                is_reclaim,
            },
        )
    }

    /// Transition `task_id` to `COMPLETED`. Fails fast (no silent overwrite)
    /// if the task doesn't exist, isn't running, or is owned by a different
    /// worker — none of these are retried internally.
    pub fn complete(
        &self,
        task_id: &str,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<WorkflowState, CoreError> {
        let task = self.tasks.get(task_id).ok_or_else(|| CoreError::TaskNotFound {
            task_id: task_id.to_string(),
        })?;

        if task.status != TaskStatus::Running {
            return Err(CoreError::NotRunning {
                task_id: task_id.to_string(),
                status: task.status.to_string(),
            });
        }

        match task.claimed_by.as_deref() {
            Some(owner) if owner == worker_id.as_str() => {}
            Some(owner) => {
                return Err(CoreError::WorkerMismatch {
                    task_id: task_id.to_string(),
                    claimed_by: owner.to_string(),
                    worker_id: worker_id.as_str().to_string(),
                })
            }
            None => {
                return Err(CoreError::OwnershipViolation {
                    task_id: task_id.to_string(),
                    reason: "RUNNING task has no claimed_by".to_string(),
                })
            }
        }

        let mut new_state = self.clone();
        if let Some(task) = new_state.tasks.get_mut(task_id) {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(now);
        }
        Ok(new_state)
    }
}

/// `deps_satisfied(t) ≡ ∀ d ∈ t.dependencies : state.tasks[d].status == COMPLETED`.
/// Fails if a referenced dependency is missing from the map.
pub fn deps_satisfied(state: &WorkflowState, task: &Task) -> Result<bool, CoreError> {
    for dep in &task.dependencies {
        match state.tasks.get(dep) {
            Some(dep_task) => {
                if dep_task.status != TaskStatus::Completed {
                    return Ok(false);
                }
            }
            None => {
                return Err(CoreError::MissingDependency {
                    task_id: task.id.clone(),
                    dependency_id: dep.clone(),
                })
            }
        }
    }
    Ok(true)
}

/// First `PENDING` task (in mapping order) with satisfied dependencies; if
/// none, the first timed-out `RUNNING` task with satisfied dependencies
/// (the reclaim path). Otherwise `None`.
pub fn claimable_next(state: &WorkflowState, now: DateTime<Utc>) -> Result<Option<&Task>, CoreError> {
    for task in state.tasks.values() {
        if task.status == TaskStatus::Pending && deps_satisfied(state, task)? {
            return Ok(Some(task));
        }
    }
    for task in state.tasks.values() {
        if task.status == TaskStatus::Running
            && task.is_timed_out(now)
            && deps_satisfied(state, task)?
        {
            return Ok(Some(task));
        }
    }
    Ok(None)
}

/// Iterative DFS cycle detection. Returns the first task id found still on
/// the current path when re-entered, or `None` if the graph is acyclic.
/// Iterative by construction — dependency chains can exceed the host's
/// native recursion limit.
pub fn find_cycle(state: &WorkflowState) -> Option<String> {
    let mut visited: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut on_stack: std::collections::HashSet<String> = std::collections::HashSet::new();

    for start_id in state.tasks.keys() {
        if visited.contains(start_id) {
            continue;
        }

        let mut stack: Vec<(String, usize)> = vec![(start_id.clone(), 0)];
        on_stack.insert(start_id.clone());

        while let Some(&mut (ref node, ref mut dep_idx)) = stack.last_mut() {
            let deps_len = state.tasks.get(node).map(|t| t.dependencies.len()).unwrap_or(0);

            if *dep_idx < deps_len {
                let dep = state.tasks.get(node).and_then(|t| t.dependencies.get(*dep_idx)).cloned();
                *dep_idx += 1;

                let Some(dep) = dep else { continue };
                if !state.tasks.contains_key(&dep) {
                    // Missing dependency is a separate invariant (existence);
                    // not this function's concern.
                    continue;
                }
                if on_stack.contains(&dep) {
                    return Some(dep);
                }
                if !visited.contains(&dep) {
                    on_stack.insert(dep.clone());
                    stack.push((dep, 0));
                }
            } else if let Some((node, _)) = stack.pop() {
                on_stack.remove(&node);
                visited.insert(node);
            }
        }
    }

    None
}

/// Checks invariants 1-3: key/id consistency, acyclicity, and
/// existence of every referenced dependency. Per-task field validation
/// (non-empty id, timeout range, ownership) is delegated to `Task::validate`.
pub fn validate_dag(state: &WorkflowState) -> Result<(), CoreError> {
    for (key, task) in state.tasks.iter() {
        if key != &task.id {
            return Err(CoreError::KeyMismatch {
                key: key.clone(),
                task_id: task.id.clone(),
            });
        }
        task.validate()?;
        for dep in &task.dependencies {
            if !state.tasks.contains_key(dep) {
                return Err(CoreError::MissingDependency {
                    task_id: task.id.clone(),
                    dependency_id: dep.clone(),
                });
            }
        }
    }

    if let Some(task_id) = find_cycle(state) {
        return Err(CoreError::CycleDetected { task_id });
    }

    Ok(())
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
