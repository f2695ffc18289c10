// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn cycle_detected_names_the_offending_task() {
    let err = CoreError::CycleDetected {
        task_id: "B".to_string(),
    };
    assert!(err.to_string().contains("cycle"));
    assert!(err.to_string().contains('B'));
}

#[test]
fn missing_dependency_names_task_and_dependency() {
    let err = CoreError::MissingDependency {
        task_id: "A".to_string(),
        dependency_id: "ghost".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.to_lowercase().contains("missing"));
    assert!(msg.contains("ghost"));
}

#[test]
fn worker_mismatch_names_both_workers() {
    let err = CoreError::WorkerMismatch {
        task_id: "A".to_string(),
        claimed_by: "worker-1".to_string(),
        worker_id: "worker-2".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("worker-1"));
    assert!(msg.contains("worker-2"));
}
