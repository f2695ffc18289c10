// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debug-only guard for the three-level lock hierarchy:
//!
//! 1. State Store mutex (highest priority)
//! 2. Trajectory write mutex
//! 3. Execution Gate (lowest priority)
//!
//! A thread may not acquire a lower-numbered (higher-priority) lock while
//! holding a higher-numbered one. This module does not itself guard the
//! real mutexes — each subsystem wraps its own lock acquisition with a
//! [`LockGuard`] so ordering violations panic in debug builds instead of
//! silently risking a convoy or deadlock in production.
//!
//! The marker is thread-local, so it is only a sound check across a single
//! synchronous call stack; it is taken and dropped at the moment a lock is
//! acquired rather than held across an `.await`, since a suspended task can
//! resume on a different worker thread under the multi-threaded runtime.

use std::cell::RefCell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LockLevel {
    StateStore = 1,
    Trajectory = 2,
    ExecutionGate = 3,
}

thread_local! {
    static HELD: RefCell<Vec<LockLevel>> = const { RefCell::new(Vec::new()) };
}

/// RAII marker recording that the current thread holds `level`. Dropping it
/// releases the marker (not the real lock, which the caller still owns via
/// its own guard).
pub struct LockGuard {
    #[cfg(debug_assertions)]
    level: LockLevel,
}

impl LockGuard {
    pub fn acquire(level: LockLevel) -> Self {
        #[cfg(debug_assertions)]
        {
            HELD.with(|held| {
                let held = held.borrow();
                if let Some(&highest) = held.last() {
                    assert!(
                        level > highest,
                        "lock hierarchy violation: attempted to acquire {level:?} while holding {highest:?}"
                    );
                }
            });
            HELD.with(|held| held.borrow_mut().push(level));
            Self { level }
        }
        #[cfg(not(debug_assertions))]
        {
            Self {}
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            HELD.with(|held| {
                let mut held = held.borrow_mut();
                if let Some(pos) = held.iter().rposition(|&l| l == self.level) {
                    held.remove(pos);
                }
            });
        }
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
