// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The dialogue transcript line format (`dialogue_transcript.jsonl`).
//!
//! One JSON object per physical line. Field names and values here are the
//! wire contract consumed by the web UI; they must not drift.

use crate::{ConfirmationKind, WorkerId};
use serde::{Deserialize, Serialize};

/// Who is talking to whom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "worker→supervisor")]
    WorkerToSupervisor,
    #[serde(rename = "supervisor→worker")]
    SupervisorToWorker,
}

crate::simple_display! {
    Direction {
        WorkerToSupervisor => "worker→supervisor",
        SupervisorToWorker => "supervisor→worker",
    }
}

/// What a transcript entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Output,
    ConfirmationRequest,
    ConfirmationResponse,
    Lifecycle,
    Note,
}

crate::simple_display! {
    EntryType {
        Output => "output",
        ConfirmationRequest => "confirmation_request",
        ConfirmationResponse => "confirmation_response",
        Lifecycle => "lifecycle",
        Note => "note",
    }
}

/// One line of `dialogue_transcript.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// ISO-8601 UTC, millisecond precision
    pub timestamp: String,
    pub worker_id: WorkerId,
    pub direction: Direction,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub content: String,
    /// Present only on confirmation_request / confirmation_response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_type: Option<ConfirmationKind>,
    /// Short extracted prompt, confirmation entries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_message: Option<String>,
    /// Monotonically increasing per worker
    pub seq: u64,
}

impl TranscriptEntry {
    /// Entry for bytes the worker printed.
    pub fn output(
        worker_id: WorkerId,
        timestamp: String,
        seq: u64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            worker_id,
            direction: Direction::WorkerToSupervisor,
            entry_type: EntryType::Output,
            content: content.into(),
            confirmation_type: None,
            confirmation_message: None,
            seq,
        }
    }

    /// Entry for a recognised confirmation prompt.
    pub fn confirmation_request(
        worker_id: WorkerId,
        timestamp: String,
        seq: u64,
        kind: ConfirmationKind,
        prompt: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            worker_id,
            direction: Direction::WorkerToSupervisor,
            entry_type: EntryType::ConfirmationRequest,
            content: prompt.into(),
            confirmation_type: Some(kind),
            confirmation_message: Some(message.into()),
            seq,
        }
    }

    /// Entry for the reply written back into the worker's stdin.
    pub fn confirmation_response(
        worker_id: WorkerId,
        timestamp: String,
        seq: u64,
        kind: ConfirmationKind,
        reply: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            worker_id,
            direction: Direction::SupervisorToWorker,
            entry_type: EntryType::ConfirmationResponse,
            content: reply.into(),
            confirmation_type: Some(kind),
            confirmation_message: Some(message.into()),
            seq,
        }
    }

    /// Lifecycle marker (spawned, completed, …).
    pub fn lifecycle(
        worker_id: WorkerId,
        timestamp: String,
        seq: u64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            worker_id,
            direction: Direction::WorkerToSupervisor,
            entry_type: EntryType::Lifecycle,
            content: content.into(),
            confirmation_type: None,
            confirmation_message: None,
            seq,
        }
    }

    /// Supervisor-side annotation (escalation timeouts, fallbacks, …).
    pub fn note(
        worker_id: WorkerId,
        timestamp: String,
        seq: u64,
        content: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            worker_id,
            direction: Direction::SupervisorToWorker,
            entry_type: EntryType::Note,
            content: content.into(),
            confirmation_type: None,
            confirmation_message: None,
            seq,
        }
    }
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
