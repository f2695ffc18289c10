// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The project registry and socket routing.
//!
//! Socket routing derives a per-worktree socket path from the first 16 hex
//! characters of `sha256(abs(worktree))`; the sibling `<hash>.lock` file is
//! the non-blocking advisory lock that enforces one daemon per worktree.
//! The registry itself is a small JSON document recording which
//! worktrees have an active daemon, written atomically under an exclusive
//! `~/.harness/registry.lock` so concurrent daemon startups race-safely
//! append their own entry rather than clobber each other's.

use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const HASH_PREFIX_LEN: usize = 16;

/// `sha256(abs(worktree))[:16]`, hex-encoded.
pub fn worktree_hash(worktree: &Path) -> String {
    let canonical = worktree.to_string_lossy();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{digest:x}")[..HASH_PREFIX_LEN].to_string()
}

/// `~/.harness/sockets/<hash>.sock` for this worktree.
pub fn socket_path(home: &Path, worktree: &Path) -> PathBuf {
    home.join(".harness").join("sockets").join(format!("{}.sock", worktree_hash(worktree)))
}

/// The sibling singleton lock for a given socket path.
pub fn lock_path_for_socket(socket_path: &Path) -> PathBuf {
    socket_path.with_extension("lock")
}

/// One worktree's entry in the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub path: PathBuf,
    pub last_active: DateTime<Utc>,
}

/// `{ "projects": { <hash16>: { "path": ..., "last_active": ... } } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub projects: IndexMap<String, ProjectEntry>,
}

/// Handle onto `~/.harness/registry.json`, guarded by `~/.harness/registry.lock`.
pub struct ProjectRegistry {
    path: PathBuf,
    lock_path: PathBuf,
}

impl ProjectRegistry {
    /// `path` is conventionally `~/.harness/registry.json`; the lock file
    /// lives alongside it as `registry.lock`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_file_name("registry.lock");
        Self { path, lock_path }
    }

    fn read(&self) -> Result<Registry, RegistryError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| RegistryError::Decode {
                path: self.path.clone(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Registry::default()),
            Err(source) => Err(RegistryError::Io { path: self.path.clone(), source }),
        }
    }

    fn write_atomically(&self, registry: &Registry) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(registry).map_err(|source| RegistryError::Decode {
            path: tmp_path.clone(),
            source,
        })?;
        let mut file = fs::File::create(&tmp_path)
            .map_err(|source| RegistryError::Io { path: tmp_path.clone(), source })?;
        file.write_all(&bytes).map_err(|source| RegistryError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        file.sync_all().map_err(|source| RegistryError::Io { path: tmp_path.clone(), source })?;
        drop(file);
        fs::rename(&tmp_path, &self.path)
            .map_err(|source| RegistryError::Io { path: self.path.clone(), source })
    }

    /// Record `worktree` as active as of `now`, under the exclusive registry
    /// lock. Race-safe against concurrent daemon startups for
    /// other worktrees.
    pub fn register(&self, worktree: &Path, now: DateTime<Utc>) -> Result<(), RegistryError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let lock_file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|source| RegistryError::Io { path: self.lock_path.clone(), source })?;
        lock_file
            .lock_exclusive()
            .map_err(|source| RegistryError::LockFailed { path: self.lock_path.clone(), source })?;

        let mut registry = self.read()?;
        registry.projects.insert(
            worktree_hash(worktree),
            ProjectEntry { path: worktree.to_path_buf(), last_active: now },
        );
        let result = self.write_atomically(&registry);
        let _ = FileExt::unlock(&lock_file);
        result
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
