// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker status aggregation for the web UI.
//!
//! Cheap read API over in-flight state. All mutation goes through a
//! per-worker lock; readers snapshot immutable copies, so status reads
//! never block other workers. Derived `progress` and `health` are
//! computed at read time from the stored record.

use fm_core::{iso_millis, WorkerId, WorkerRecord, WorkerState};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Liveness heuristic over `last_activity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Idle,
    Stalled,
}

fm_core::simple_display! {
    Health {
        Healthy => "healthy",
        Idle => "idle",
        Stalled => "stalled",
    }
}

const IDLE_AFTER_MS: u64 = 30_000;
const STALLED_AFTER_MS: u64 = 120_000;

/// Full per-worker status served by `GET /api/v1/workers/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatus {
    pub worker_id: WorkerId,
    pub task: String,
    pub state: WorkerState,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub output_lines: u64,
    pub confirmation_count: u64,
    pub last_activity: String,
    pub elapsed_seconds: u64,
    /// 0..=100; ≤ 95 until a terminal state
    pub progress: u8,
    pub health: Health,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
}

/// Fleet summary served by `GET /api/v1/status/summary`.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
    pub total_workers: usize,
    pub active_workers: usize,
    pub completed_workers: usize,
    pub error_workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_progress: Option<f64>,
}

#[derive(Debug, Clone)]
struct StatusRecord {
    record: WorkerRecord,
    memory_mb: Option<f64>,
    cpu_percent: Option<f64>,
}

/// In-memory status registry. One lock per worker record.
#[derive(Default)]
pub struct StatusAggregator {
    workers: RwLock<HashMap<WorkerId, Arc<RwLock<StatusRecord>>>>,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly-spawned worker.
    pub fn register(&self, worker_id: WorkerId, task: &str, now_ms: u64) {
        let record = WorkerRecord::new(worker_id.clone(), task, now_ms);
        self.workers.write().insert(
            worker_id,
            Arc::new(RwLock::new(StatusRecord { record, memory_mb: None, cpu_percent: None })),
        );
    }

    /// Apply a state transition. Illegal transitions are ignored with a
    /// warning so a racing terminate cannot corrupt a terminal state.
    pub fn update_state(
        &self,
        worker_id: &WorkerId,
        state: WorkerState,
        error_message: Option<String>,
        now_ms: u64,
    ) {
        let Some(slot) = self.slot(worker_id) else { return };
        let mut status = slot.write();
        if !status.record.state.can_transition_to(state) && status.record.state != state {
            tracing::warn!(
                %worker_id,
                from = %status.record.state,
                to = %state,
                "ignoring illegal state transition"
            );
            return;
        }
        status.record.state = state;
        status.record.last_activity_ms = now_ms;
        if state.is_terminal() {
            status.record.completed_time_ms = Some(now_ms);
        }
        if let Some(message) = error_message {
            status.record.error_message = Some(message);
        }
    }

    /// Update output counters (totals, monotone).
    pub fn update_output_metrics(&self, worker_id: &WorkerId, output_lines: u64, now_ms: u64) {
        let Some(slot) = self.slot(worker_id) else { return };
        let mut status = slot.write();
        status.record.output_lines = status.record.output_lines.max(output_lines);
        status.record.last_activity_ms = now_ms;
    }

    pub fn update_confirmation_count(&self, worker_id: &WorkerId, count: u64, now_ms: u64) {
        let Some(slot) = self.slot(worker_id) else { return };
        let mut status = slot.write();
        status.record.confirmation_count = status.record.confirmation_count.max(count);
        status.record.last_activity_ms = now_ms;
    }

    pub fn update_performance_metrics(
        &self,
        worker_id: &WorkerId,
        memory_mb: f64,
        cpu_percent: Option<f64>,
    ) {
        let Some(slot) = self.slot(worker_id) else { return };
        let mut status = slot.write();
        status.memory_mb = Some(memory_mb);
        status.cpu_percent = cpu_percent;
    }

    pub fn remove_worker(&self, worker_id: &WorkerId) {
        self.workers.write().remove(worker_id);
    }

    pub fn contains(&self, worker_id: &WorkerId) -> bool {
        self.workers.read().contains_key(worker_id)
    }

    pub fn get_status(&self, worker_id: &WorkerId, now_ms: u64) -> Option<WorkerStatus> {
        let slot = self.slot(worker_id)?;
        let status = slot.read().clone();
        Some(derive_status(&status, now_ms))
    }

    pub fn list_all(&self, now_ms: u64) -> Vec<WorkerStatus> {
        let slots: Vec<_> = self.workers.read().values().cloned().collect();
        let mut all: Vec<WorkerStatus> =
            slots.iter().map(|slot| derive_status(&slot.read().clone(), now_ms)).collect();
        all.sort_by(|a, b| a.worker_id.as_str().cmp(b.worker_id.as_str()));
        all
    }

    pub fn get_summary(&self, now_ms: u64) -> FleetSummary {
        let all = self.list_all(now_ms);
        let total_workers = all.len();
        let active_workers = all.iter().filter(|w| !w.state.is_terminal()).count();
        let completed_workers =
            all.iter().filter(|w| w.state == WorkerState::Completed).count();
        let error_workers = all.iter().filter(|w| w.state == WorkerState::Failed).count();
        let avg_progress = if total_workers > 0 {
            Some(all.iter().map(|w| w.progress as f64).sum::<f64>() / total_workers as f64)
        } else {
            None
        };
        FleetSummary { total_workers, active_workers, completed_workers, error_workers, avg_progress }
    }

    fn slot(&self, worker_id: &WorkerId) -> Option<Arc<RwLock<StatusRecord>>> {
        self.workers.read().get(worker_id).cloned()
    }
}

fn derive_status(status: &StatusRecord, now_ms: u64) -> WorkerStatus {
    let record = &status.record;
    WorkerStatus {
        worker_id: record.worker_id.clone(),
        task: record.task.clone(),
        state: record.state,
        start_time: iso_millis(record.start_time_ms),
        completed_time: record.completed_time_ms.map(iso_millis),
        error_message: record.error_message.clone(),
        output_lines: record.output_lines,
        confirmation_count: record.confirmation_count,
        last_activity: iso_millis(record.last_activity_ms),
        elapsed_seconds: record.elapsed_secs(now_ms),
        progress: progress_of(record, now_ms),
        health: health_of(record, now_ms),
        memory_mb: status.memory_mb,
        cpu_percent: status.cpu_percent,
    }
}

/// Rough monotone progress signal for the UI; never claims completion
/// before the worker exits.
fn progress_of(record: &WorkerRecord, now_ms: u64) -> u8 {
    if record.state.is_terminal() {
        return 100;
    }
    if record.state == WorkerState::Spawning {
        return 5;
    }
    let output_part = (record.output_lines as f64 / 50.0 * 40.0).min(40.0);
    let confirmation_part = (record.confirmation_count as f64 / 5.0 * 30.0).min(30.0);
    let elapsed_part = (record.elapsed_secs(now_ms) as f64 / 300.0 * 20.0).min(20.0);
    let raw = 10.0 + output_part + confirmation_part + elapsed_part;
    raw.min(95.0) as u8
}

fn health_of(record: &WorkerRecord, now_ms: u64) -> Health {
    if record.state.is_terminal() {
        return Health::Healthy;
    }
    let quiet_ms = now_ms.saturating_sub(record.last_activity_ms);
    if quiet_ms > STALLED_AFTER_MS {
        Health::Stalled
    } else if quiet_ms > IDLE_AFTER_MS {
        Health::Idle
    } else {
        Health::Healthy
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
