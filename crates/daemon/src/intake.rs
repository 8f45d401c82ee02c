// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task intake: launch an initial fleet from a TOML file.
//!
//! The decomposer that produces task specs is an external collaborator;
//! its output reaches this daemon as a file of `[[worker]]` tables:
//!
//! ```toml
//! [[worker]]
//! worker_id = "wkr-auth"        # optional, generated when absent
//! task = "port the auth module"
//! command = "claude -p 'port the auth module'"
//! ```

use crate::DaemonError;
use fm_manager::{SpawnSpec, WorkerManager};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Deserialize)]
struct IntakeFile {
    #[serde(default, rename = "worker")]
    workers: Vec<WorkerEntry>,
}

#[derive(Debug, Deserialize)]
struct WorkerEntry {
    #[serde(default)]
    worker_id: Option<String>,
    #[serde(default)]
    task: String,
    command: String,
    #[serde(default)]
    env: Vec<(String, String)>,
}

/// Spawn every worker in the intake file and run their sessions
/// concurrently. Returns the session join handles.
pub fn launch_from_file(
    path: Option<&Path>,
    manager: Arc<WorkerManager>,
    max_iterations: u64,
) -> Result<Vec<JoinHandle<()>>, DaemonError> {
    let Some(path) = path else {
        tracing::info!("no task intake file, starting with an empty fleet");
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .map_err(|e| DaemonError::Intake(format!("{}: {e}", path.display())))?;
    let intake: IntakeFile =
        toml::from_str(&raw).map_err(|e| DaemonError::Intake(e.to_string()))?;

    let mut sessions = Vec::new();
    for entry in intake.workers {
        let spec = match entry.worker_id {
            Some(id) => SpawnSpec::new(id, entry.command),
            None => SpawnSpec::with_generated_id(entry.command),
        }
        .task(entry.task)
        .env(entry.env);

        let worker_id = match manager.spawn(spec) {
            Ok(worker_id) => worker_id,
            Err(e) => {
                tracing::error!(error = %e, "worker spawn failed, skipping");
                continue;
            }
        };
        let manager = Arc::clone(&manager);
        sessions.push(tokio::spawn(async move {
            match manager.run_interactive_session(&worker_id, max_iterations).await {
                Ok(result) => tracing::info!(%worker_id, result = ?result, "session finished"),
                Err(e) => tracing::error!(%worker_id, error = %e, "session failed"),
            }
        }));
    }
    Ok(sessions)
}

#[cfg(test)]
#[path = "intake_tests.rs"]
mod tests;
