// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker on-disk layout.
//!
//! ```text
//! <workspace_root>/
//!   <worker_id>/
//!     dialogue_transcript.jsonl
//!     raw_terminal.log
//!     metrics.jsonl
//!     task.txt            (optional)
//! ```

use crate::StoreError;
use fm_core::WorkerId;
use std::path::{Path, PathBuf};

pub const TRANSCRIPT_FILE: &str = "dialogue_transcript.jsonl";
pub const RAW_LOG_FILE: &str = "raw_terminal.log";
pub const METRICS_FILE: &str = "metrics.jsonl";
pub const TASK_FILE: &str = "task.txt";

/// Worker ids become directory names; restrict them to a filesystem-safe
/// alphabet so no id can escape the workspace root.
pub fn validate_worker_id(id: &WorkerId) -> Result<(), StoreError> {
    let s = id.as_str();
    let ok = !s.is_empty()
        && !s.starts_with('.')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidWorkerId(s.to_string()))
    }
}

/// Resolved paths for one worker's workspace directory.
#[derive(Debug, Clone)]
pub struct WorkerDirs {
    dir: PathBuf,
}

impl WorkerDirs {
    pub fn new(workspace_root: &Path, worker_id: &WorkerId) -> Result<Self, StoreError> {
        validate_worker_id(worker_id)?;
        Ok(Self { dir: workspace_root.join(worker_id.as_str()) })
    }

    /// Create the worker directory and optionally persist the task label.
    pub fn init(&self, task: Option<&str>) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|source| StoreError::Workspace { path: self.dir.clone(), source })?;
        if let Some(task) = task {
            std::fs::write(self.task_path(), task)
                .map_err(|source| StoreError::Workspace { path: self.task_path(), source })?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn transcript_path(&self) -> PathBuf {
        self.dir.join(TRANSCRIPT_FILE)
    }

    pub fn raw_log_path(&self) -> PathBuf {
        self.dir.join(RAW_LOG_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    pub fn task_path(&self) -> PathBuf {
        self.dir.join(TASK_FILE)
    }
}

#[cfg(test)]
#[path = "dirs_tests.rs"]
mod tests;
