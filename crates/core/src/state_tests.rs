// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::Task;
use chrono::Duration;

fn epoch(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(seconds, 0).unwrap()
}

fn linear_chain() -> IndexMap<String, Task> {
    let mut tasks = IndexMap::new();
    tasks.insert("A".to_string(), Task::new("A", "first", vec![]).unwrap());
    tasks.insert(
        "B".to_string(),
        Task::new("B", "second", vec!["A".to_string()]).unwrap(),
    );
    tasks.insert(
        "C".to_string(),
        Task::new("C", "third", vec!["B".to_string()]).unwrap(),
    );
    tasks
}

#[test]
fn validates_a_clean_linear_chain() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    assert!(state.validate_dag().is_ok());
}

#[test]
fn rejects_a_two_cycle() {
    let mut tasks = IndexMap::new();
    tasks.insert("A".to_string(), Task::new("A", "", vec!["B".to_string()]).unwrap());
    tasks.insert("B".to_string(), Task::new("B", "", vec!["A".to_string()]).unwrap());
    let err = WorkflowState::new(tasks).unwrap_err();
    assert!(matches!(err, CoreError::CycleDetected { .. }));
}

#[test]
fn rejects_a_missing_dependency() {
    let mut tasks = IndexMap::new();
    tasks.insert(
        "A".to_string(),
        Task::new("A", "", vec!["ghost".to_string()]).unwrap(),
    );
    let err = WorkflowState::new(tasks).unwrap_err();
    assert!(matches!(err, CoreError::MissingDependency { .. }));
}

#[test]
fn rejects_key_id_mismatch() {
    let mut tasks = IndexMap::new();
    tasks.insert("B".to_string(), Task::new("A", "", vec![]).unwrap());
    let err = WorkflowState::new(tasks).unwrap_err();
    assert!(matches!(err, CoreError::KeyMismatch { .. }));
}

#[test]
fn cycle_detection_handles_long_chains_iteratively() {
    let mut tasks = IndexMap::new();
    tasks.insert("t0".to_string(), Task::new("t0", "", vec![]).unwrap());
    for i in 1..20_000 {
        let id = format!("t{i}");
        let dep = format!("t{}", i - 1);
        tasks.insert(id.clone(), Task::new(id, "", vec![dep]).unwrap());
    }
    let state = WorkflowState::new(tasks).expect("a long acyclic chain must validate");
    assert!(state.validate_dag().is_ok());
}

#[test]
fn claimable_next_skips_tasks_with_unsatisfied_deps() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let next = state.claimable_next(epoch(0)).unwrap().unwrap();
    assert_eq!(next.id, "A");
}

#[test]
fn claimable_next_never_returns_a_task_with_incomplete_deps() {
    let mut tasks = linear_chain();
    tasks
        .get_mut("A")
        .unwrap()
        .status = TaskStatus::Running;
    let state = WorkflowState { tasks };
    let next = state.claimable_next(epoch(0)).unwrap();
    assert!(next.is_none());
}

#[test]
fn claim_hands_out_the_first_pending_task() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let worker = WorkerId::new("worker-1");
    let (new_state, result) = state.claim(&worker, epoch(100));
    let claimed = result.task.unwrap();
    assert_eq!(claimed.id, "A");
    assert!(!result.is_retry);
    assert!(!result.is_reclaim);
    assert_eq!(new_state.tasks["A"].status, TaskStatus::Running);
    assert_eq!(new_state.tasks["A"].claimed_by.as_deref(), Some("worker-1"));
}

#[test]
fn claim_is_idempotent_and_renews_the_lease() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let worker = WorkerId::new("worker-1");
    let (state, first) = state.claim(&worker, epoch(0));
    assert!(!first.is_retry);

    let (state, second) = state.claim(&worker, epoch(500));
    assert!(second.is_retry);
    assert!(!second.is_reclaim);
    let task = second.task.unwrap();
    assert_eq!(task.id, "A");
    assert_eq!(task.status, TaskStatus::Running);
    assert_eq!(state.tasks["A"].started_at, Some(epoch(500)));
}

#[test]
fn claim_returns_none_when_nothing_is_claimable() {
    let mut tasks = IndexMap::new();
    tasks.insert("A".to_string(), Task::new("A", "", vec![]).unwrap());
    let mut running = tasks.get("A").unwrap().clone();
    running.status = TaskStatus::Running;
    running.claimed_by = Some("worker-other".to_string());
    running.started_at = Some(epoch(0));
    tasks.insert("A".to_string(), running);

    let state = WorkflowState { tasks };
    let worker = WorkerId::new("worker-1");
    let (_, result) = state.claim(&worker, epoch(10));
    assert!(result.task.is_none());
}

#[test]
fn reclaim_only_happens_after_timeout() {
    let mut tasks = IndexMap::new();
    let mut running = Task::new("A", "", vec![]).unwrap();
    running.status = TaskStatus::Running;
    running.claimed_by = Some("worker-1".to_string());
    running.started_at = Some(epoch(0));
    running.timeout_seconds = 1;
    tasks.insert("A".to_string(), running);
    let state = WorkflowState { tasks };

    let other = WorkerId::new("worker-2");
    let (_, not_yet) = state.claim(&other, epoch(0) + Duration::seconds(0));
    assert!(not_yet.task.is_none());

    let (new_state, reclaimed) = state.claim(&other, epoch(10));
    assert!(reclaimed.is_reclaim);
    assert!(!reclaimed.is_retry);
    let task = reclaimed.task.unwrap();
    assert_eq!(task.claimed_by.as_deref(), Some("worker-2"));
    assert_eq!(new_state.tasks["A"].claimed_by.as_deref(), Some("worker-2"));
}

#[test]
fn complete_transitions_a_running_task() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let worker = WorkerId::new("worker-1");
    let (state, _) = state.claim(&worker, epoch(0));
    let state = state.complete("A", &worker, epoch(5)).unwrap();
    assert_eq!(state.tasks["A"].status, TaskStatus::Completed);
    assert_eq!(state.tasks["A"].completed_at, Some(epoch(5)));
}

#[test]
fn complete_fails_for_wrong_worker() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let owner = WorkerId::new("worker-1");
    let (state, _) = state.claim(&owner, epoch(0));

    let impostor = WorkerId::new("worker-2");
    let err = state.complete("A", &impostor, epoch(5)).unwrap_err();
    assert!(matches!(err, CoreError::WorkerMismatch { .. }));
    assert_eq!(state.tasks["A"].status, TaskStatus::Running);
}

#[test]
fn complete_fails_for_non_running_task() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let worker = WorkerId::new("worker-1");
    let err = state.complete("A", &worker, epoch(5)).unwrap_err();
    assert!(matches!(err, CoreError::NotRunning { .. }));
}

#[test]
fn complete_fails_for_unknown_task() {
    let state = WorkflowState::new(linear_chain()).unwrap();
    let worker = WorkerId::new("worker-1");
    let err = state.complete("ghost", &worker, epoch(5)).unwrap_err();
    assert!(matches!(err, CoreError::TaskNotFound { .. }));
}

#[test]
fn deps_satisfied_fails_loudly_on_missing_dependency() {
    let mut tasks = IndexMap::new();
    tasks.insert("A".to_string(), Task::new("A", "", vec!["ghost".to_string()]).unwrap());
    let state = WorkflowState { tasks };
    let task = state.tasks["A"].clone();
    let err = state.deps_satisfied(&task).unwrap_err();
    assert!(matches!(err, CoreError::MissingDependency { .. }));
}

mod props {
    use super::*;
    use proptest::prelude::*;

    /// A linear chain of `n` tasks, t0..t(n-1), each depending on its
    /// predecessor. Always acyclic by construction.
    fn linear_chain_of(n: usize) -> IndexMap<String, Task> {
        let mut tasks = IndexMap::new();
        for i in 0..n {
            let id = format!("t{i}");
            let deps = if i == 0 {
                vec![]
            } else {
                vec![format!("t{}", i - 1)]
            };
            tasks.insert(id.clone(), Task::new(id, "", deps).unwrap());
        }
        tasks
    }

    proptest! {
        /// claimable_next never hands back a task whose dependencies are
        /// not all COMPLETED.
        #[test]
        fn claimable_next_respects_dependencies(n in 1usize..12, completed_through in 0usize..12) {
            let mut tasks = linear_chain_of(n);
            let completed_through = completed_through.min(n.saturating_sub(1));
            for i in 0..completed_through {
                if let Some(task) = tasks.get_mut(&format!("t{i}")) {
                    task.status = TaskStatus::Completed;
                    task.completed_at = Some(Utc::now());
                }
            }
            let state = WorkflowState { tasks };
            if let Ok(Some(next)) = state.claimable_next(Utc::now()) {
                prop_assert!(state.deps_satisfied(next).unwrap());
            }
        }

        /// Every save/update that succeeds validates: the property is
        /// trivial for a linear chain, but exercises it across sizes.
        #[test]
        fn linear_chains_always_validate(n in 0usize..50) {
            let tasks = linear_chain_of(n);
            prop_assert!(WorkflowState::new(tasks).is_ok());
        }

        /// claim(w) followed immediately by claim(w) is idempotent and
        /// always renews the lease.
        #[test]
        fn claim_then_reclaim_is_idempotent(n in 1usize..8) {
            let tasks = linear_chain_of(n);
            let state = WorkflowState::new(tasks).unwrap();
            let worker = WorkerId::new("worker-prop");
            let (state, first) = state.claim(&worker, epoch(0));
            if let Some(task) = first.task {
                let (_, second) = state.claim(&worker, epoch(100));
                prop_assert!(second.is_retry);
                prop_assert!(!second.is_reclaim);
                prop_assert_eq!(second.task.unwrap().id, task.id);
            }
        }
    }
}
