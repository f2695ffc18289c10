// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task values: the nodes of the workflow DAG.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lower bound on `timeout_seconds`.
pub const MIN_TIMEOUT_SECONDS: i64 = 1;
/// Upper bound on `timeout_seconds` (24 hours).
pub const MAX_TIMEOUT_SECONDS: i64 = 86_400;
/// Default `timeout_seconds` for a task that doesn't specify one.
pub const DEFAULT_TIMEOUT_SECONDS: i64 = 600;

/// Closed set of states a task can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

crate::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
    }
}

/// A node in the workflow DAG.
///
/// Tasks are frozen values: every transition (claim, complete, reclaim)
/// produces a new `Task` rather than mutating one in place. The extended
/// packet fields (`files_in_scope`, `output_contract`, ...) are opaque to
/// the core — they are carried verbatim for the plan parser and runtime
/// to interpret, never inspected here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_in_scope: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_out_of_scope: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_context: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_contract: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_commands: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_criteria: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_to_read: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts_to_write: Option<serde_json::Value>,
}

fn default_timeout_seconds() -> i64 {
    DEFAULT_TIMEOUT_SECONDS
}

impl Task {
    /// Construct a new `PENDING` task with the given id, description, and
    /// dependencies, validating the fields the builder can't enforce at
    /// compile time (non-empty trimmed id, no duplicate dependency, timeout
    /// range). Dependency *existence* is a graph-level concern checked by
    /// [`crate::state::validate_dag`], not here.
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        dependencies: Vec<String>,
    ) -> Result<Self, CoreError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(CoreError::EmptyTaskId);
        }
        let mut seen = std::collections::HashSet::new();
        for dep in &dependencies {
            if !seen.insert(dep.as_str()) {
                return Err(CoreError::DuplicateDependency {
                    task_id: id,
                    dependency_id: dep.clone(),
                });
            }
        }
        Ok(Self {
            id,
            description: description.into(),
            status: TaskStatus::Pending,
            dependencies,
            started_at: None,
            completed_at: None,
            claimed_by: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            instructions: None,
            role: None,
            model: None,
            files_in_scope: None,
            files_out_of_scope: None,
            input_context: None,
            output_contract: None,
            constraints: None,
            tools: None,
            verification_commands: None,
            success_criteria: None,
            artifacts_to_read: None,
            artifacts_to_write: None,
        })
    }

    /// Validate fields that don't depend on the rest of the graph:
    /// non-empty trimmed id, no duplicate dependency, timeout in range, and
    /// the ownership invariant.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::EmptyTaskId);
        }
        let mut seen = std::collections::HashSet::new();
        for dep in &self.dependencies {
            if !seen.insert(dep.as_str()) {
                return Err(CoreError::DuplicateDependency {
                    task_id: self.id.clone(),
                    dependency_id: dep.clone(),
                });
            }
        }
        if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&self.timeout_seconds) {
            return Err(CoreError::InvalidTimeout {
                task_id: self.id.clone(),
                value: self.timeout_seconds,
            });
        }
        self.validate_ownership()
    }

    fn validate_ownership(&self) -> Result<(), CoreError> {
        match self.status {
            TaskStatus::Running => {
                if self.claimed_by.is_none() || self.started_at.is_none() {
                    return Err(CoreError::OwnershipViolation {
                        task_id: self.id.clone(),
                        reason: "RUNNING requires claimed_by and started_at".to_string(),
                    });
                }
            }
            TaskStatus::Completed => {
                if self.completed_at.is_none() {
                    return Err(CoreError::OwnershipViolation {
                        task_id: self.id.clone(),
                        reason: "COMPLETED requires completed_at".to_string(),
                    });
                }
            }
            TaskStatus::Pending | TaskStatus::Failed => {
                if self.claimed_by.is_some() {
                    return Err(CoreError::OwnershipViolation {
                        task_id: self.id.clone(),
                        reason: format!("{} must not have claimed_by", self.status),
                    });
                }
            }
        }
        Ok(())
    }

    /// Is this task timed out given `now`? Only meaningful for `RUNNING` tasks.
    pub fn is_timed_out(&self, now: chrono::DateTime<Utc>) -> bool {
        match (self.status, self.started_at) {
            (TaskStatus::Running, Some(started_at)) => {
                (now - started_at).num_seconds() > self.timeout_seconds
            }
            _ => false,
        }
    }
}

crate::builder! {
    pub struct TaskBuilder => Task {
        into {
            id: String = "A",
            description: String = "",
        }
        set {
            status: TaskStatus = TaskStatus::Pending,
            dependencies: Vec<String> = Vec::new(),
            timeout_seconds: i64 = DEFAULT_TIMEOUT_SECONDS,
        }
        option {
            started_at: DateTime<Utc> = None,
            completed_at: DateTime<Utc> = None,
            claimed_by: String = None,
            instructions: String = None,
            role: String = None,
            model: String = None,
            files_in_scope: serde_json::Value = None,
            files_out_of_scope: serde_json::Value = None,
            input_context: serde_json::Value = None,
            output_contract: serde_json::Value = None,
            constraints: serde_json::Value = None,
            tools: serde_json::Value = None,
            verification_commands: serde_json::Value = None,
            success_criteria: serde_json::Value = None,
            artifacts_to_read: serde_json::Value = None,
            artifacts_to_write: serde_json::Value = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
