// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The resident State Store: a single mutex guarding the
//! authoritative `WorkflowState`, with tmp-fsync-rename persistence to
//! `<worktree>/.claude/dev-workflow-state.json`.
//!
//! The store is loaded from disk at most once, lazily, on first `load()`.
//! Every mutating operation rebuilds a new `WorkflowState` by value,
//! persists it atomically, assigns it as resident, and releases the lock
//! before returning — callers are responsible for trajectory logging after
//! the lock is dropped (release-then-log).

use crate::error::StoreError;
use crate::locks::{LockGuard, LockLevel};
use harness_core::{ClaimResult, Clock, WorkerId, WorkflowState};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Resident state plus the bookkeeping needed to load it lazily exactly once.
struct Resident {
    state: Option<WorkflowState>,
    loaded_from_disk: bool,
}

/// The authoritative single-writer copy of `WorkflowState` for one worktree.
pub struct StateStore<C: Clock> {
    path: PathBuf,
    resident: Mutex<Resident>,
    clock: C,
}

impl<C: Clock> StateStore<C> {
    /// `path` is the on-disk state file, conventionally
    /// `<worktree>/.claude/dev-workflow-state.json`.
    pub fn new(path: impl Into<PathBuf>, clock: C) -> Self {
        Self {
            path: path.into(),
            resident: Mutex::new(Resident {
                state: None,
                loaded_from_disk: false,
            }),
            clock,
        }
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        epoch_ms_to_utc(self.clock.epoch_ms())
    }

    /// The resident state, loading from disk exactly once if present.
    /// Returns `None` if neither resident nor on-disk state exists.
    pub fn load(&self) -> Result<Option<WorkflowState>, StoreError> {
        let _level = LockGuard::acquire(LockLevel::StateStore);
        let mut resident = self.resident.lock();
        self.ensure_loaded(&mut resident)?;
        Ok(resident.state.clone())
    }

    /// Load from disk into `resident` exactly once, if neither a resident
    /// value nor a prior load attempt already accounts for it. Caller must
    /// already hold `self.resident`'s lock.
    fn ensure_loaded(&self, resident: &mut Resident) -> Result<(), StoreError> {
        if !resident.loaded_from_disk && resident.state.is_none() {
            resident.state = self.read_from_disk()?;
            resident.loaded_from_disk = true;
        }
        Ok(())
    }

    fn read_from_disk(&self) -> Result<Option<WorkflowState>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => {
                let state: WorkflowState =
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                        path: self.path.clone(),
                        source,
                    })?;
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Validate `state.validate_dag()`, persist atomically on success, and
    /// assign it as resident. Fails before touching disk on cycles or
    /// missing dependencies.
    pub fn save(&self, state: WorkflowState) -> Result<WorkflowState, StoreError> {
        state.validate_dag()?;
        let _level = LockGuard::acquire(LockLevel::StateStore);
        let mut resident = self.resident.lock();
        self.persist_locked(&mut resident, state)
    }

    /// Write `state` atomically to disk and assign it as resident. Caller
    /// must already hold `self.resident`'s lock for the whole read-modify-write
    /// this is part of, so concurrent callers never observe (or persist) a
    /// state derived from a stale read — see `claim_task`/`complete_task`.
    fn persist_locked(
        &self,
        resident: &mut Resident,
        state: WorkflowState,
    ) -> Result<WorkflowState, StoreError> {
        write_atomically(&self.path, &state)?;
        resident.state = Some(state.clone());
        resident.loaded_from_disk = true;
        tracing::info!(tasks = state.tasks.len(), "state saved");
        Ok(state)
    }

    /// Clear resident state and delete the on-disk file. Idempotent.
    pub fn reset(&self) -> Result<(), StoreError> {
        let _level = LockGuard::acquire(LockLevel::StateStore);
        let mut resident = self.resident.lock();
        resident.state = None;
        resident.loaded_from_disk = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StoreError::Write {
                    path: self.path.clone(),
                    source,
                })
            }
        }
        tracing::info!("state reset");
        Ok(())
    }

    /// Partial replacement of top-level `WorkflowState` fields. The only
    /// recognized field is `tasks`, accepted as either a mapping
    /// `id -> task-or-dict` or a list of task-or-dict; both are coerced to
    /// the canonical mapping before re-validation.
    pub fn update(&self, updates: &serde_json::Value) -> Result<WorkflowState, StoreError> {
        let _level = LockGuard::acquire(LockLevel::StateStore);
        let mut resident = self.resident.lock();
        self.ensure_loaded(&mut resident)?;
        let current = resident.state.clone().unwrap_or_default();
        let tasks = match updates.get("tasks") {
            Some(value) => coerce_tasks(value)?,
            None => current.tasks.clone(),
        };
        let new_state = WorkflowState::new(tasks)?;
        self.persist_locked(&mut resident, new_state)
    }

    /// Atomic claim: the read (current resident state), the decision of
    /// which task (if any) becomes claimable, and the persisted write all
    /// happen under one acquisition of the resident lock. Splitting this
    /// into a `load()` followed by a later `save()` would let two
    /// concurrent claimants both read the same pre-claim state and both
    /// "win" the same task before either write lands.
    pub fn claim_task(&self, worker_id: &WorkerId) -> Result<ClaimResult, StoreError> {
        let _level = LockGuard::acquire(LockLevel::StateStore);
        let mut resident = self.resident.lock();
        self.ensure_loaded(&mut resident)?;
        let current = resident.state.clone().unwrap_or_default();
        let now = self.now();
        let (new_state, result) = current.claim(worker_id, now);
        if result.task.is_some() {
            self.persist_locked(&mut resident, new_state)?;
        }
        Ok(result)
    }

    /// Transition `task_id` to `COMPLETED`. Fails fast on not-found,
    /// not-running, or wrong-worker; state unchanged on failure. Read and
    /// write happen under one lock acquisition, same reasoning as `claim_task`.
    pub fn complete_task(&self, task_id: &str, worker_id: &WorkerId) -> Result<(), StoreError> {
        let _level = LockGuard::acquire(LockLevel::StateStore);
        let mut resident = self.resident.lock();
        self.ensure_loaded(&mut resident)?;
        let current = resident.state.clone().unwrap_or_default();
        let now = self.now();
        let new_state = current.complete(task_id, worker_id, now)?;
        self.persist_locked(&mut resident, new_state)?;
        Ok(())
    }
}

fn epoch_ms_to_utc(epoch_ms: u64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(epoch_ms as i64).unwrap_or_else(chrono::Utc::now)
}

fn coerce_tasks(value: &serde_json::Value) -> Result<IndexMap<String, harness_core::Task>, StoreError> {
    let mut tasks = IndexMap::new();
    match value {
        serde_json::Value::Object(map) => {
            for (id, raw) in map {
                let task: harness_core::Task =
                    serde_json::from_value(raw.clone()).map_err(|source| StoreError::Decode {
                        path: PathBuf::from(format!("tasks.{id}")),
                        source,
                    })?;
                tasks.insert(id.clone(), task);
            }
        }
        serde_json::Value::Array(items) => {
            for raw in items {
                let task: harness_core::Task =
                    serde_json::from_value(raw.clone()).map_err(|source| StoreError::Decode {
                        path: PathBuf::from("tasks[]"),
                        source,
                    })?;
                tasks.insert(task.id.clone(), task);
            }
        }
        _ => {
            return Err(StoreError::Decode {
                path: PathBuf::from("tasks"),
                source: serde::de::Error::custom("tasks must be an object or array"),
            })
        }
    }
    Ok(tasks)
}

/// Write `state.json.tmp`, fsync its fd, then atomically rename over the
/// real path. `fsync`s the file, not the
/// containing directory; rename is atomic on POSIX.
fn write_atomically(path: &Path, state: &WorkflowState) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(state).map_err(|source| StoreError::Decode {
        path: tmp_path.clone(),
        source,
    })?;

    let mut file = fs::File::create(&tmp_path).map_err(|source| StoreError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    file.write_all(&bytes).map_err(|source| StoreError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    file.sync_all().map_err(|source| StoreError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
