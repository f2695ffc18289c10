// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL trajectory log.
//!
//! `log` appends one JSON object per line under a write lock that is
//! strictly lower than the State Store mutex in the hierarchy — it must
//! never be held while the state lock is held. `tail(n)` reads the last `n`
//! events with a reverse-block algorithm bounded by `max_buffer_bytes`,
//! never allocating the whole file.

use crate::error::TrajectoryError;
use crate::locks::{LockGuard, LockLevel};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

const BLOCK_SIZE: usize = 8192;
const DEFAULT_MAX_BUFFER_BYTES: usize = 8 * 1024 * 1024;

/// Append-only JSONL writer/reader for one worktree's event log.
pub struct Trajectory {
    path: PathBuf,
    write_lock: Mutex<()>,
    max_buffer_bytes: usize,
}

impl Trajectory {
    /// `path` is conventionally `<worktree>/.claude/trajectory.jsonl`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            max_buffer_bytes: DEFAULT_MAX_BUFFER_BYTES,
        }
    }

    #[cfg(test)]
    fn with_max_buffer_bytes(path: impl Into<PathBuf>, max_buffer_bytes: usize) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            max_buffer_bytes,
        }
    }

    /// Append one event. `timestamp` is added if absent.
    pub fn log(&self, mut event: serde_json::Value) -> Result<(), TrajectoryError> {
        if let Some(obj) = event.as_object_mut() {
            obj.entry("timestamp").or_insert_with(|| {
                serde_json::Value::from(
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_secs_f64(),
                )
            });
        }

        let line = serde_json::to_string(&event).map_err(|e| TrajectoryError::Append {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let _level = LockGuard::acquire(LockLevel::Trajectory);
        let _guard = self.write_lock.lock();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| TrajectoryError::Append {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| TrajectoryError::Append {
                path: self.path.clone(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| TrajectoryError::Append {
            path: self.path.clone(),
            source,
        })?;
        file.flush().map_err(|source| TrajectoryError::Append {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// The last `n` events, newest-last. Malformed lines are skipped.
    /// Reads backward in fixed-size blocks so bytes read stay proportional
    /// to `n`, not the file size.
    pub fn tail(&self, n: usize) -> Result<Vec<serde_json::Value>, TrajectoryError> {
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(TrajectoryError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file_len = file
            .metadata()
            .map_err(|source| TrajectoryError::Read {
                path: self.path.clone(),
                source,
            })?
            .len();

        let mut blocks: Vec<Vec<u8>> = Vec::new();
        let mut pos = file_len;
        let mut buffered_bytes = 0usize;
        let mut newline_count = 0usize;

        while pos > 0 {
            let read_size = BLOCK_SIZE.min(pos as usize);
            pos -= read_size as u64;
            let mut buf = vec![0u8; read_size];
            file.seek(SeekFrom::Start(pos)).map_err(|source| TrajectoryError::Read {
                path: self.path.clone(),
                source,
            })?;
            file.read_exact(&mut buf).map_err(|source| TrajectoryError::Read {
                path: self.path.clone(),
                source,
            })?;
            newline_count += buf.iter().filter(|&&b| b == b'\n').count();
            buffered_bytes += buf.len();
            blocks.push(buf);

            if newline_count > n || buffered_bytes >= self.max_buffer_bytes {
                break;
            }
        }

        // Blocks were pushed newest-last-byte-range-first; reverse to
        // restore file order, then join once (list-then-join, never a
        // per-block growing concatenation).
        blocks.reverse();
        let joined: Vec<u8> = blocks.into_iter().flatten().collect();
        let text = String::from_utf8_lossy(&joined);

        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let tail_lines = if lines.len() > n {
            &lines[lines.len() - n..]
        } else {
            &lines[..]
        };

        Ok(tail_lines
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

#[cfg(test)]
#[path = "trajectory_tests.rs"]
mod tests;
