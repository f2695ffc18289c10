// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn acquiring_in_priority_order_is_fine() {
    let state = LockGuard::acquire(LockLevel::StateStore);
    let trajectory = LockGuard::acquire(LockLevel::Trajectory);
    let gate = LockGuard::acquire(LockLevel::ExecutionGate);
    drop(gate);
    drop(trajectory);
    drop(state);
}

#[test]
fn dropping_releases_the_marker_so_it_can_be_reacquired() {
    {
        let _state = LockGuard::acquire(LockLevel::StateStore);
    }
    let _state_again = LockGuard::acquire(LockLevel::StateStore);
}

#[test]
#[cfg_attr(not(debug_assertions), ignore)]
#[should_panic(expected = "lock hierarchy violation")]
fn acquiring_a_higher_priority_lock_while_holding_a_lower_one_panics() {
    let _gate = LockGuard::acquire(LockLevel::ExecutionGate);
    let _state = LockGuard::acquire(LockLevel::StateStore);
}
