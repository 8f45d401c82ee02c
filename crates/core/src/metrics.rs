// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Metric event lines (`metrics.jsonl`).
//!
//! Per-worker events form a coherent lifecycle: exactly one `spawned`,
//! at most one of `completed` / `failed` / `terminated`.

use crate::{ConfirmationOutcome, DecidedBy, WorkerId};
use serde::{Deserialize, Serialize};

/// Lifecycle marker carried by `worker_lifecycle` metric events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Spawned,
    Completed,
    Failed,
    Terminated,
}

crate::simple_display! {
    LifecycleEvent {
        Spawned => "spawned",
        Completed => "completed",
        Failed => "failed",
        Terminated => "terminated",
    }
}

impl LifecycleEvent {
    /// Whether this event closes the lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Spawned)
    }
}

/// One line of `metrics.jsonl`, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricEvent {
    WorkerLifecycle {
        timestamp: String,
        worker_id: WorkerId,
        event: LifecycleEvent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_seconds: Option<f64>,
    },
    Confirmation {
        timestamp: String,
        worker_id: WorkerId,
        confirmation_number: u64,
        orchestrator_latency_ms: u64,
        response: ConfirmationOutcome,
        decided_by: DecidedBy,
    },
    Output {
        timestamp: String,
        worker_id: WorkerId,
        output_size_bytes: u64,
        line_count: u64,
    },
    Performance {
        timestamp: String,
        worker_id: WorkerId,
        memory_mb: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cpu_percent: Option<f64>,
    },
}

impl MetricEvent {
    pub fn worker_id(&self) -> &WorkerId {
        match self {
            Self::WorkerLifecycle { worker_id, .. }
            | Self::Confirmation { worker_id, .. }
            | Self::Output { worker_id, .. }
            | Self::Performance { worker_id, .. } => worker_id,
        }
    }

    pub fn timestamp(&self) -> &str {
        match self {
            Self::WorkerLifecycle { timestamp, .. }
            | Self::Confirmation { timestamp, .. }
            | Self::Output { timestamp, .. }
            | Self::Performance { timestamp, .. } => timestamp,
        }
    }

    /// Wire value of the `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::WorkerLifecycle { .. } => "worker_lifecycle",
            Self::Confirmation { .. } => "confirmation",
            Self::Output { .. } => "output",
            Self::Performance { .. } => "performance",
        }
    }
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod tests;
