// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fmd: the foreman supervisor daemon.
//!
//! Wires the pieces together: config, tracing, the hybrid decision engine
//! (with an optional HTTP advisor), the worker manager, the file monitor,
//! and the REST/WebSocket gateway. Task specs come from an external
//! decomposer; this binary takes them from a TOML intake file.

mod env;
mod escalation;
mod intake;

use escalation::NotifyEscalation;
use fm_core::SupervisorConfig;
use fm_gateway::AppState;
use fm_judge::{HttpAdvisor, HybridEngine, SafetyAdvisor};
use fm_manager::{StatusAggregator, WorkerManager};
use fm_storage::{FileMonitor, WorkerDirs};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] fm_core::ConfigError),

    #[error("cannot resolve a state directory (set FM_STATE_DIR or HOME)")]
    NoStateDir,

    #[error("task intake failed: {0}")]
    Intake(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn init_tracing(state_dir: &std::path::Path) -> Result<tracing_appender::non_blocking::WorkerGuard, DaemonError>
{
    std::fs::create_dir_all(state_dir.join("logs"))?;
    let appender = tracing_appender::rolling::daily(state_dir.join("logs"), "fmd.log");
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = tracing_subscriber::EnvFilter::try_new(env::log_filter())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(guard)
}

async fn run() -> Result<(), DaemonError> {
    let state_dir = env::state_dir()?;
    let _guard = init_tracing(&state_dir)?;

    let config = match env::config_path() {
        Some(path) => SupervisorConfig::load(&path)?,
        None => {
            let config = SupervisorConfig::default();
            config.validate()?;
            config
        }
    };
    let config = Arc::new(config);
    std::fs::create_dir_all(&config.workspace_root)?;

    let advisor: Option<Arc<dyn SafetyAdvisor>> = env::advisor_url().map(|url| {
        tracing::info!(%url, "AI advisor enabled");
        Arc::new(HttpAdvisor::new(url, config.workspace_root.display().to_string()))
            as Arc<dyn SafetyAdvisor>
    });

    let status = Arc::new(StatusAggregator::new());
    let engine = Arc::new(HybridEngine::new(&config, advisor));
    let escalation = Arc::new(NotifyEscalation::new());
    let manager = Arc::new(WorkerManager::new(
        Arc::clone(&config),
        Arc::clone(&engine),
        escalation,
        Arc::clone(&status),
    ));
    let monitor = Arc::new(FileMonitor::new(
        config.poll_interval_ms,
        config.history_emit_limit,
        1024,
    ));

    let app_state = Arc::new(AppState::new(
        Arc::clone(&status),
        Arc::clone(&monitor),
        engine.log(),
        Arc::clone(&config),
    ));

    let shutdown = CancellationToken::new();

    // Gateway
    let listener = tokio::net::TcpListener::bind(env::http_addr()).await?;
    let gateway = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = fm_gateway::server::serve(app_state, listener) => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "gateway exited");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        })
    };

    // Fleet intake
    let sessions = intake::launch_from_file(
        env::tasks_path().as_deref(),
        Arc::clone(&manager),
        env::max_iterations(),
    )?;

    // Shutdown on SIGINT/SIGTERM
    wait_for_signal().await;
    tracing::info!("shutdown requested, draining workers");
    shutdown.cancel();

    for status in manager.list_workers() {
        if !status.state.is_terminal() {
            if let Err(e) = manager.terminate(&status.worker_id, "daemon shutdown").await {
                tracing::warn!(worker_id = %status.worker_id, error = %e, "terminate failed");
            }
        }
        if let Ok(dirs) = WorkerDirs::new(&config.workspace_root, &status.worker_id) {
            monitor.unwatch(&dirs.transcript_path()).await;
            monitor.unwatch(&dirs.raw_log_path()).await;
        }
    }
    for session in sessions {
        let _ = session.await;
    }
    let _ = gateway.await;
    tracing::info!("daemon stopped");
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("fmd: {e}");
        std::process::exit(1);
    }
}
