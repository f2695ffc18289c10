// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};

/// Overrides the computed socket path (`HARNESS_SOCKET`).
pub fn socket_override() -> Option<PathBuf> {
    std::env::var_os("HARNESS_SOCKET").map(PathBuf::from)
}

/// Overrides the auto-detected worktree root (`HARNESS_WORKTREE`).
pub fn worktree_override() -> Option<PathBuf> {
    std::env::var_os("HARNESS_WORKTREE").map(PathBuf::from)
}

/// Overrides the registry file path, primarily for tests (`HARNESS_REGISTRY_FILE`).
pub fn registry_file_override() -> Option<PathBuf> {
    std::env::var_os("HARNESS_REGISTRY_FILE").map(PathBuf::from)
}

/// Id of the container the daemon should execute commands inside, if any
/// (`HARNESS_CONTAINER_ID`). When set, `LocalRuntime` routes every `exec`
/// and git invocation through `docker exec <id> ...` instead of spawning
/// the program directly, and `check_capabilities` additionally requires
/// `docker` to be present.
pub fn container_id() -> Option<String> {
    std::env::var("HARNESS_CONTAINER_ID").ok().filter(|s| !s.is_empty())
}

/// Host-side root corresponding to the container's view of the worktree
/// (`HARNESS_HOST_ROOT`). Paired with [`container_root`] to translate a
/// `cwd` computed in host-path terms (the worktree root) into the
/// container's own mount point before it's passed to `docker exec -w`.
pub fn host_root() -> Option<PathBuf> {
    std::env::var_os("HARNESS_HOST_ROOT").map(PathBuf::from)
}

/// Container-side root corresponding to the host's view of the worktree
/// (`HARNESS_CONTAINER_ROOT`). See [`host_root`].
pub fn container_root() -> Option<PathBuf> {
    std::env::var_os("HARNESS_CONTAINER_ROOT").map(PathBuf::from)
}

/// Rewrite `path` from the host's view of the worktree to the container's,
/// if both [`host_root`] and [`container_root`] are configured and `path`
/// falls under `host_root`. Returns `path` unchanged otherwise.
pub fn translate_path_for_container(path: &Path) -> PathBuf {
    match (host_root(), container_root()) {
        (Some(host), Some(container)) => match path.strip_prefix(&host) {
            Ok(rest) => container.join(rest),
            Err(_) => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// `<worktree>/.claude/dev-workflow-state.json`, the on-disk state path.
pub fn state_path(worktree: &Path) -> PathBuf {
    worktree.join(".claude").join("dev-workflow-state.json")
}

/// `<worktree>/.claude/trajectory.jsonl`, the trajectory log path.
pub fn trajectory_path(worktree: &Path) -> PathBuf {
    worktree.join(".claude").join("trajectory.jsonl")
}

/// `<worktree>/.claude/progress.txt`, written by `context_preserve`.
pub fn progress_path(worktree: &Path) -> PathBuf {
    worktree.join(".claude").join("progress.txt")
}

/// The user's home directory, used to derive `~/.harness/...` paths.
/// Not itself one of the recognized overrides, but centralized here so
/// every path derivation goes through one function.
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
