// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Execution Gate: a process-wide mutex serializing git
//! mutations and exclusive `exec` calls. Sits below the State Store and
//! Trajectory locks in the hierarchy — holders of this gate must not
//! hold either of those.

use crate::locks::{LockGuard, LockLevel};
use tokio::sync::Mutex;

/// Git subcommands that are explicitly read-only and may skip the gate.
/// Per spec, read-only is the whitelisted case: any subcommand not listed
/// here — including ones this list doesn't know about — is treated as a
/// mutation and must acquire the gate.
const READ_ONLY_GIT_SUBCOMMANDS: &[&str] = &[
    "status",
    "rev-parse",
    "log",
    "show",
    "diff",
    "diff-index",
    "diff-tree",
    "ls-files",
    "ls-tree",
    "ls-remote",
    "cat-file",
    "describe",
    "blame",
    "shortlog",
    "for-each-ref",
    "count-objects",
    "fsck",
    "verify-commit",
    "verify-tag",
    "name-rev",
    "merge-base",
    "rev-list",
];

/// Global git options that take a separate value argument, which must be
/// skipped rather than mistaken for the subcommand (e.g. `git -C /repo
/// commit` — the subcommand is `commit`, not `/repo`).
const GLOBAL_OPTIONS_WITH_VALUE: &[&str] = &["-C", "-c", "--git-dir", "--work-tree", "--namespace"];

/// The first real subcommand in a git invocation, skipping global flags and
/// the values of any that take one.
fn git_subcommand(args: &[String]) -> Option<&str> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if GLOBAL_OPTIONS_WITH_VALUE.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if arg.starts_with('-') {
            continue;
        }
        return Some(arg.as_str());
    }
    None
}

/// Classify a git invocation as mutating or read-only. Unknown or absent
/// subcommands default to mutating (fail safe, per spec §4.4/§4.5.5:
/// `read_only = false` by default).
pub fn is_git_mutation(args: &[String]) -> bool {
    match git_subcommand(args) {
        Some(sub) => !READ_ONLY_GIT_SUBCOMMANDS.contains(&sub),
        None => true,
    }
}

/// Process-wide singleton mutex guarding exclusive execution. Named, rather
/// than anonymous, so the lock hierarchy debug guard can name it in
/// diagnostics.
pub struct ExecutionGate {
    lock: Mutex<()>,
}

impl Default for ExecutionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionGate {
    pub fn new() -> Self {
        Self { lock: Mutex::new(()) }
    }

    /// Acquire the gate for the duration of `fut`, holding it across the
    /// entire external call.
    pub async fn with_exclusive<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        drop(LockGuard::acquire(LockLevel::ExecutionGate));
        let _guard = self.lock.lock().await;
        fut.await
    }
}

#[cfg(test)]
#[path = "exec_gate_tests.rs"]
mod tests;
