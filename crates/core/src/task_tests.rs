// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_trims_the_id_and_defaults_to_pending() {
    let task = Task::new("  A  ", "do the thing", vec![]).unwrap();
    assert_eq!(task.id, "A");
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.timeout_seconds, DEFAULT_TIMEOUT_SECONDS);
    assert!(task.claimed_by.is_none());
}

#[test]
fn new_rejects_empty_id() {
    let err = Task::new("   ", "", vec![]).unwrap_err();
    assert!(matches!(err, CoreError::EmptyTaskId));
}

#[test]
fn new_rejects_duplicate_dependency() {
    let err = Task::new("A", "", vec!["B".to_string(), "B".to_string()]).unwrap_err();
    assert!(matches!(err, CoreError::DuplicateDependency { .. }));
}

#[test]
fn validate_rejects_timeout_out_of_range() {
    let mut task = Task::new("A", "", vec![]).unwrap();
    task.timeout_seconds = 0;
    assert!(matches!(
        task.validate().unwrap_err(),
        CoreError::InvalidTimeout { .. }
    ));

    task.timeout_seconds = 86_401;
    assert!(matches!(
        task.validate().unwrap_err(),
        CoreError::InvalidTimeout { .. }
    ));

    task.timeout_seconds = 86_400;
    assert!(task.validate().is_ok());
}

#[test]
fn validate_enforces_running_requires_claimed_by_and_started_at() {
    let mut task = Task::new("A", "", vec![]).unwrap();
    task.status = TaskStatus::Running;
    assert!(matches!(
        task.validate().unwrap_err(),
        CoreError::OwnershipViolation { .. }
    ));

    task.claimed_by = Some("worker-1".to_string());
    task.started_at = Some(Utc::now());
    assert!(task.validate().is_ok());
}

#[test]
fn validate_enforces_completed_requires_completed_at() {
    let mut task = Task::new("A", "", vec![]).unwrap();
    task.status = TaskStatus::Completed;
    assert!(matches!(
        task.validate().unwrap_err(),
        CoreError::OwnershipViolation { .. }
    ));
    task.completed_at = Some(Utc::now());
    assert!(task.validate().is_ok());
}

#[test]
fn validate_rejects_claimed_by_on_pending_or_failed() {
    let mut task = Task::new("A", "", vec![]).unwrap();
    task.claimed_by = Some("worker-1".to_string());
    assert!(matches!(
        task.validate().unwrap_err(),
        CoreError::OwnershipViolation { .. }
    ));

    task.status = TaskStatus::Failed;
    assert!(matches!(
        task.validate().unwrap_err(),
        CoreError::OwnershipViolation { .. }
    ));
}

#[test]
fn is_timed_out_only_applies_to_running_tasks() {
    let mut task = Task::new("A", "", vec![]).unwrap();
    let start = Utc::now();
    task.status = TaskStatus::Running;
    task.claimed_by = Some("worker-1".to_string());
    task.started_at = Some(start);
    task.timeout_seconds = 10;

    assert!(!task.is_timed_out(start + chrono::Duration::seconds(5)));
    assert!(task.is_timed_out(start + chrono::Duration::seconds(11)));

    task.status = TaskStatus::Pending;
    task.claimed_by = None;
    assert!(!task.is_timed_out(start + chrono::Duration::seconds(11)));
}

#[test]
fn status_display_is_lowercase() {
    assert_eq!(TaskStatus::Pending.to_string(), "pending");
    assert_eq!(TaskStatus::Running.to_string(), "running");
    assert_eq!(TaskStatus::Completed.to_string(), "completed");
    assert_eq!(TaskStatus::Failed.to_string(), "failed");
}

#[test]
fn round_trips_through_json() {
    let mut task = Task::new("A", "do it", vec!["B".to_string()]).unwrap();
    task.instructions = Some("read the file first".to_string());
    let encoded = serde_json::to_string(&task).unwrap();
    let decoded: Task = serde_json::from_str(&encoded).unwrap();
    assert_eq!(task, decoded);
}

#[test]
fn builder_produces_a_valid_default_task() {
    let task = Task::builder().id("A").build();
    assert!(task.validate().is_ok());
    assert_eq!(task.status, TaskStatus::Pending);
}
