// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn translate_path_for_container_rewrites_the_host_prefix() {
    std::env::set_var("HARNESS_HOST_ROOT", "/home/user/project");
    std::env::set_var("HARNESS_CONTAINER_ROOT", "/workspace");

    let translated = translate_path_for_container(Path::new("/home/user/project/sub/dir"));

    std::env::remove_var("HARNESS_HOST_ROOT");
    std::env::remove_var("HARNESS_CONTAINER_ROOT");

    assert_eq!(translated, PathBuf::from("/workspace/sub/dir"));
}

#[test]
#[serial]
fn translate_path_for_container_leaves_path_unchanged_without_both_roots() {
    std::env::remove_var("HARNESS_HOST_ROOT");
    std::env::remove_var("HARNESS_CONTAINER_ROOT");

    let path = Path::new("/home/user/project/sub");
    assert_eq!(translate_path_for_container(path), path.to_path_buf());
}

#[test]
#[serial]
fn translate_path_for_container_leaves_path_unchanged_outside_host_root() {
    std::env::set_var("HARNESS_HOST_ROOT", "/home/user/project");
    std::env::set_var("HARNESS_CONTAINER_ROOT", "/workspace");

    let path = Path::new("/somewhere/else");
    let translated = translate_path_for_container(path);

    std::env::remove_var("HARNESS_HOST_ROOT");
    std::env::remove_var("HARNESS_CONTAINER_ROOT");

    assert_eq!(translated, path.to_path_buf());
}

#[test]
#[serial]
fn container_id_is_none_when_unset_or_empty() {
    std::env::remove_var("HARNESS_CONTAINER_ID");
    assert!(container_id().is_none());

    std::env::set_var("HARNESS_CONTAINER_ID", "");
    assert!(container_id().is_none());
    std::env::remove_var("HARNESS_CONTAINER_ID");
}

#[test]
#[serial]
fn container_id_is_returned_when_set() {
    std::env::set_var("HARNESS_CONTAINER_ID", "abc123");
    assert_eq!(container_id().as_deref(), Some("abc123"));
    std::env::remove_var("HARNESS_CONTAINER_ID");
}
