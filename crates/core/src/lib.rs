// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! harness-core: the DAG model for the harness orchestration daemon.
//!
//! This crate owns the pure, side-effect-free parts of the system: task and
//! workflow values, DAG validation, the claim/deps-satisfied predicates, and
//! the injectable clock used to make lease timeouts testable. Nothing here
//! touches disk or a socket — that belongs to `harness-daemon`.

pub mod macros;

pub mod clock;
pub mod error;
pub mod state;
pub mod task;
pub mod worker;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::CoreError;
pub use state::{claimable_next, deps_satisfied, find_cycle, validate_dag, ClaimResult, WorkflowState};
pub use task::{
    Task, TaskStatus, DEFAULT_TIMEOUT_SECONDS, MAX_TIMEOUT_SECONDS, MIN_TIMEOUT_SECONDS,
};
pub use worker::WorkerId;
