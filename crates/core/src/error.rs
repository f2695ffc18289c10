// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the DAG model.

/// Errors produced by task construction, DAG validation, and the claim/complete
/// predicates. Every variant carries enough context to build a human-readable
/// message without the caller re-deriving which task was at fault.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A task's `id` was empty or all-whitespace.
    #[error("task id must not be empty")]
    EmptyTaskId,

    /// A task's `dependencies` list contained the same id more than once.
    #[error("task `{task_id}` lists dependency `{dependency_id}` more than once")]
    DuplicateDependency {
        task_id: String,
        dependency_id: String,
    },

    /// `timeout_seconds` fell outside `[1, 86_400]`.
    #[error("task `{task_id}` has invalid timeout_seconds {value} (must be in [1, 86400])")]
    InvalidTimeout { task_id: String, value: i64 },

    /// A mapping key did not match the task's own `id` (invariant 1).
    #[error("task map key `{key}` does not match task id `{task_id}`")]
    KeyMismatch { key: String, task_id: String },

    /// The dependency graph contains a cycle reachable from `task_id`.
    #[error("cycle detected at task `{task_id}`")]
    CycleDetected { task_id: String },

    /// A task depends on an id that is not present in the workflow.
    #[error("task `{task_id}` has missing dependency `{dependency_id}`")]
    MissingDependency {
        task_id: String,
        dependency_id: String,
    },

    /// Ownership invariant violated: an inconsistent
    /// status/claimed_by/started_at/completed_at combination, such as a
    /// running task with no claimant.
    #[error("task `{task_id}` violates ownership invariant: {reason}")]
    OwnershipViolation { task_id: String, reason: String },

    /// `claim_task` or `complete_task` referenced an id that does not exist.
    #[error("no such task: `{task_id}`")]
    TaskNotFound { task_id: String },

    /// `complete_task` was called on a task that is not currently `RUNNING`.
    #[error("task `{task_id}` is not running (status: {status})")]
    NotRunning { task_id: String, status: String },

    /// `complete_task` was called by a worker that does not hold the claim.
    #[error(
        "task `{task_id}` is claimed by `{claimed_by}`, not `{worker_id}`"
    )]
    WorkerMismatch {
        task_id: String,
        claimed_by: String,
        worker_id: String,
    },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
