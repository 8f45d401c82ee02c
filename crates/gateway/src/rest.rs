// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! REST snapshot endpoints.
//!
//! Always JSON; 404 with an `error` body for unknown workers; 200 with
//! empty lists when there is simply no data yet.

use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fm_core::{Clock, WorkerId};
use fm_manager::WorkerStatus;
use fm_storage::TailReader;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Bound on how much of a worker's metrics file one request will read.
const METRICS_READ_CAP: usize = 10_000;

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "worker not found" }))).into_response()
}

/// Compact per-worker row for the fleet listing.
#[derive(Serialize)]
struct WorkerRow {
    worker_id: WorkerId,
    state: fm_core::WorkerState,
    last_activity: String,
    output_lines: u64,
    confirmation_count: u64,
}

impl From<&WorkerStatus> for WorkerRow {
    fn from(status: &WorkerStatus) -> Self {
        Self {
            worker_id: status.worker_id.clone(),
            state: status.state,
            last_activity: status.last_activity.clone(),
            output_lines: status.output_lines,
            confirmation_count: status.confirmation_count,
        }
    }
}

/// `GET /api/v1/workers`
pub async fn list_workers(State(state): State<Arc<AppState>>) -> Response {
    let all = state.status.list_all(state.clock.epoch_ms());
    let workers: Vec<WorkerRow> = all.iter().map(WorkerRow::from).collect();
    Json(json!({ "workers": workers, "count": workers.len() })).into_response()
}

/// `GET /api/v1/workers/{worker_id}`
pub async fn get_worker(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Response {
    let worker_id = WorkerId::new(worker_id);
    match state.status.get_status(&worker_id, state.clock.epoch_ms()) {
        Some(status) => Json(status).into_response(),
        None => not_found(),
    }
}

/// `GET /api/v1/status/summary`
pub async fn status_summary(State(state): State<Arc<AppState>>) -> Response {
    Json(state.status.get_summary(state.clock.epoch_ms())).into_response()
}

/// `GET /api/v1/status/health`
pub async fn status_health(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({
        "status": "healthy",
        "monitor_initialized": true,
        "workspace_root": state.config.workspace_root.display().to_string(),
    }))
    .into_response()
}

/// `GET /api/v1/metrics/current`
pub async fn metrics_current(State(state): State<Arc<AppState>>) -> Response {
    Json(state.decisions.metrics()).into_response()
}

#[derive(Deserialize)]
pub struct RecentQuery {
    limit: Option<usize>,
}

/// `GET /api/v1/decisions/recent?limit=N` — newest first, default 100,
/// cap 1000.
pub async fn decisions_recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(100).min(1000);
    Json(state.decisions.recent(limit)).into_response()
}

/// Read up to the last `METRICS_READ_CAP` parseable metric lines.
fn read_metric_lines(state: &AppState, worker_id: &WorkerId) -> Option<Vec<Value>> {
    let dirs = state.worker_dirs(worker_id)?;
    let mut reader = TailReader::from_start(dirs.metrics_path());
    let lines = match reader.read_new_lines() {
        Ok(lines) => lines,
        Err(e) => {
            tracing::warn!(%worker_id, error = %e, "metrics read failed");
            return Some(Vec::new());
        }
    };
    let start = lines.len().saturating_sub(METRICS_READ_CAP);
    Some(
        lines[start..]
            .iter()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .collect(),
    )
}

/// `GET /api/v1/workers/{worker_id}/metrics`
pub async fn worker_metrics(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Response {
    let worker_id = WorkerId::new(worker_id);
    if state.status.get_status(&worker_id, state.clock.epoch_ms()).is_none() {
        return not_found();
    }
    let metrics = read_metric_lines(&state, &worker_id).unwrap_or_default();
    Json(json!({
        "worker_id": worker_id,
        "metrics": metrics,
        "count": metrics.len(),
    }))
    .into_response()
}

/// Aggregated counters over one worker's metric events.
#[derive(Default, Serialize)]
struct WorkerMetricsSummary {
    worker_id: String,
    lifecycle_events: u64,
    confirmations: u64,
    approved: u64,
    denied: u64,
    escalated: u64,
    avg_confirmation_latency_ms: f64,
    output_size_bytes: u64,
    line_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_memory_mb: Option<f64>,
}

/// `GET /api/v1/workers/{worker_id}/metrics/summary`
pub async fn worker_metrics_summary(
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Response {
    let worker_id = WorkerId::new(worker_id);
    if state.status.get_status(&worker_id, state.clock.epoch_ms()).is_none() {
        return not_found();
    }
    let metrics = read_metric_lines(&state, &worker_id).unwrap_or_default();

    let mut summary =
        WorkerMetricsSummary { worker_id: worker_id.to_string(), ..Default::default() };
    let mut latency_total = 0u64;
    for event in &metrics {
        match event["type"].as_str() {
            Some("worker_lifecycle") => summary.lifecycle_events += 1,
            Some("confirmation") => {
                summary.confirmations += 1;
                latency_total += event["orchestrator_latency_ms"].as_u64().unwrap_or(0);
                match event["response"].as_str() {
                    Some("approved") => summary.approved += 1,
                    Some("denied") => summary.denied += 1,
                    Some("escalated") => summary.escalated += 1,
                    _ => {}
                }
            }
            Some("output") => {
                // totals are cumulative; the last event wins
                summary.output_size_bytes =
                    event["output_size_bytes"].as_u64().unwrap_or(summary.output_size_bytes);
                summary.line_count = event["line_count"].as_u64().unwrap_or(summary.line_count);
            }
            Some("performance") => {
                summary.last_memory_mb = event["memory_mb"].as_f64();
            }
            _ => {}
        }
    }
    if summary.confirmations > 0 {
        summary.avg_confirmation_latency_ms =
            latency_total as f64 / summary.confirmations as f64;
    }
    Json(summary).into_response()
}

#[cfg(test)]
#[path = "rest_tests.rs"]
mod tests;
