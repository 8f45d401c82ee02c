// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-manager: worker lifecycle and the confirmation dialogue.
//!
//! The worker manager owns every worker subprocess through a PTY, turns
//! its streaming output into raw-log bytes and typed confirmation
//! requests, asks the hybrid decision engine, and answers through stdin.
//! It is the sole writer of all per-worker files.

pub mod escalation;
pub mod manager;
pub mod patterns;
pub mod pty;
pub mod session;
pub mod status;

pub use escalation::{DenyAll, EscalationAnswer, EscalationHandler};
pub use manager::{SpawnSpec, WorkerManager};
pub use patterns::{ConfirmationMatcher, PendingBuffer, PromptMatch};
pub use pty::{PtySession, ReadOutcome};
pub use session::SessionResult;
pub use status::{FleetSummary, Health, StatusAggregator, WorkerStatus};

use fm_core::WorkerId;
use thiserror::Error;

/// Errors from worker lifecycle operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("worker {0} already exists")]
    DuplicateWorker(WorkerId),

    #[error("worker {0} not found")]
    UnknownWorker(WorkerId),

    #[error("worker {0} has no pending session (already running or finished)")]
    SessionUnavailable(WorkerId),

    #[error("worker limit reached ({0} active)")]
    MaxWorkers(u32),

    #[error("command template passes a skip-permissions flag: {0}")]
    ForbiddenFlag(String),

    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("worker PTY lost: {0}")]
    WorkerLost(String),

    #[error(transparent)]
    Store(#[from] fm_storage::StoreError),
}
