// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

#[test]
fn worktree_hash_is_sixteen_hex_chars_and_deterministic() {
    let a = worktree_hash(Path::new("/home/user/project"));
    let b = worktree_hash(Path::new("/home/user/project"));
    assert_eq!(a, b);
    assert_eq!(a.len(), HASH_PREFIX_LEN);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn different_worktrees_hash_differently() {
    let a = worktree_hash(Path::new("/home/user/project-a"));
    let b = worktree_hash(Path::new("/home/user/project-b"));
    assert_ne!(a, b);
}

#[test]
fn socket_path_is_derived_under_home_sockets() {
    let home = Path::new("/home/user");
    let worktree = Path::new("/home/user/project");
    let path = socket_path(home, worktree);
    assert_eq!(path.parent().unwrap(), home.join(".harness").join("sockets"));
    assert_eq!(path.extension().unwrap(), "sock");
    assert_eq!(lock_path_for_socket(&path).extension().unwrap(), "lock");
}

#[test]
fn register_creates_file_with_entry() {
    let dir = tempdir().unwrap();
    let registry = ProjectRegistry::new(dir.path().join("registry.json"));
    let worktree = Path::new("/home/user/project");
    let now = Utc::now();

    registry.register(worktree, now).unwrap();

    let loaded = registry.read().unwrap();
    let hash = worktree_hash(worktree);
    let entry = loaded.projects.get(&hash).unwrap();
    assert_eq!(entry.path, worktree);
}

#[test]
fn register_is_additive_across_worktrees() {
    let dir = tempdir().unwrap();
    let registry = ProjectRegistry::new(dir.path().join("registry.json"));
    let now = Utc::now();

    registry.register(Path::new("/a"), now).unwrap();
    registry.register(Path::new("/b"), now).unwrap();

    let loaded = registry.read().unwrap();
    assert_eq!(loaded.projects.len(), 2);
}

#[test]
fn register_updates_last_active_on_reregister() {
    let dir = tempdir().unwrap();
    let registry = ProjectRegistry::new(dir.path().join("registry.json"));
    let worktree = Path::new("/home/user/project");

    let t0 = Utc::now();
    registry.register(worktree, t0).unwrap();
    let t1 = t0 + chrono::Duration::seconds(60);
    registry.register(worktree, t1).unwrap();

    let loaded = registry.read().unwrap();
    let hash = worktree_hash(worktree);
    assert_eq!(loaded.projects.len(), 1);
    assert_eq!(loaded.projects.get(&hash).unwrap().last_active, t1);
}

#[test]
fn missing_registry_file_reads_as_empty() {
    let dir = tempdir().unwrap();
    let registry = ProjectRegistry::new(dir.path().join("registry.json"));
    let loaded = registry.read().unwrap();
    assert!(loaded.projects.is_empty());
}
