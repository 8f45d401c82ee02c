// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly and shared handler state.

use axum::routing::get;
use axum::Router;
use fm_core::{SupervisorConfig, SystemClock, WorkerId};
use fm_judge::DecisionLog;
use fm_manager::StatusAggregator;
use fm_storage::{FileMonitor, WorkerDirs};
use std::sync::Arc;

/// Shared state for every handler. Everything in here is a read handle;
/// the gateway holds no lifecycle authority over workers.
pub struct AppState {
    pub status: Arc<StatusAggregator>,
    pub monitor: Arc<FileMonitor>,
    pub decisions: Arc<DecisionLog>,
    pub config: Arc<SupervisorConfig>,
    pub clock: SystemClock,
}

impl AppState {
    pub fn new(
        status: Arc<StatusAggregator>,
        monitor: Arc<FileMonitor>,
        decisions: Arc<DecisionLog>,
        config: Arc<SupervisorConfig>,
    ) -> Self {
        Self { status, monitor, decisions, config, clock: SystemClock }
    }

    /// On-disk layout for a worker, derived from the workspace root.
    pub(crate) fn worker_dirs(&self, worker_id: &WorkerId) -> Option<WorkerDirs> {
        WorkerDirs::new(&self.config.workspace_root, worker_id).ok()
    }
}

/// Build the full REST + WebSocket router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/workers", get(crate::rest::list_workers))
        .route("/api/v1/workers/:worker_id", get(crate::rest::get_worker))
        .route("/api/v1/workers/:worker_id/metrics", get(crate::rest::worker_metrics))
        .route(
            "/api/v1/workers/:worker_id/metrics/summary",
            get(crate::rest::worker_metrics_summary),
        )
        .route("/api/v1/status/summary", get(crate::rest::status_summary))
        .route("/api/v1/status/health", get(crate::rest::status_health))
        .route("/api/v1/metrics/current", get(crate::rest::metrics_current))
        .route("/api/v1/decisions/recent", get(crate::rest::decisions_recent))
        .route("/ws/dialogue/:worker_id", get(crate::ws::dialogue_ws))
        .route("/ws/terminal/:worker_id", get(crate::ws::terminal_ws))
        .route("/ws/status/:worker_id", get(crate::ws::status_ws))
        .with_state(state)
}

/// Serve until the listener fails or the process is shut down.
pub async fn serve(
    state: Arc<AppState>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    let router = build_router(state);
    tracing::info!(addr = ?listener.local_addr().ok(), "gateway listening");
    axum::serve(listener, router).await
}
