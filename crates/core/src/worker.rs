// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity, lifecycle states, and the in-memory worker record.
//!
//! A worker is a managed subprocess running an external AI coding CLI,
//! attached to a pseudo-terminal. `WorkerId` is opaque to consumers and
//! unique within a workspace.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new WorkerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this WorkerId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Lifecycle state of a worker.
///
/// Transitions:
/// `Spawning → Running ⇄ WaitingConfirmation`, then one of
/// `Completed | Failed | Terminated`. Terminal states are absorbing;
/// `Terminated` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Subprocess launched, no output seen yet
    Spawning,
    /// Producing output
    Running,
    /// A confirmation request is open and awaiting a reply
    WaitingConfirmation,
    /// Exited with code 0
    Completed,
    /// Exited non-zero, or the PTY was lost
    Failed,
    /// Explicitly terminated by the supervisor
    Terminated,
}

crate::simple_display! {
    WorkerState {
        Spawning => "spawning",
        Running => "running",
        WaitingConfirmation => "waiting_confirmation",
        Completed => "completed",
        Failed => "failed",
        Terminated => "terminated",
    }
}

impl WorkerState {
    /// Whether this state is terminal (absorbing).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Terminated)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        use WorkerState::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Terminated) | (_, Failed) => true,
            (Spawning, Running) => true,
            (Running, WaitingConfirmation) | (Running, Completed) => true,
            (WaitingConfirmation, Running) => true,
            _ => false,
        }
    }
}

/// In-memory record of a worker, owned by the worker manager.
///
/// Counters are monotonically non-decreasing within a lifecycle;
/// `last_activity_ms` is updated on every input/output/confirmation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub worker_id: WorkerId,
    /// Human task label
    pub task: String,
    pub state: WorkerState,
    /// Epoch ms when the worker was spawned
    pub start_time_ms: u64,
    /// Epoch ms when the worker reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_time_ms: Option<u64>,
    pub output_lines: u64,
    pub confirmation_count: u64,
    /// Epoch ms of the most recent I/O or confirmation event
    pub last_activity_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkerRecord {
    pub fn new(worker_id: WorkerId, task: impl Into<String>, now_ms: u64) -> Self {
        Self {
            worker_id,
            task: task.into(),
            state: WorkerState::Spawning,
            start_time_ms: now_ms,
            completed_time_ms: None,
            output_lines: 0,
            confirmation_count: 0,
            last_activity_ms: now_ms,
            error_message: None,
        }
    }

    /// Elapsed wall time in seconds; freezes once terminal.
    pub fn elapsed_secs(&self, now_ms: u64) -> u64 {
        let end = self.completed_time_ms.unwrap_or(now_ms);
        end.saturating_sub(self.start_time_ms) / 1000
    }
}

crate::builder! {
    pub struct WorkerRecordBuilder => WorkerRecord {
        into {
            worker_id: WorkerId = "wkr-test",
            task: String = "test task",
        }
        set {
            state: WorkerState = WorkerState::Running,
            start_time_ms: u64 = 1_000_000,
            output_lines: u64 = 0,
            confirmation_count: u64 = 0,
            last_activity_ms: u64 = 1_000_000,
        }
        option {
            completed_time_ms: u64 = None,
            error_message: String = None,
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
