// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the end-to-end specs.

use fm_core::{ExecutionMode, SupervisorConfig, TranscriptEntry};
use fm_judge::HybridEngine;
use fm_manager::{DenyAll, StatusAggregator, WorkerManager};
use fm_storage::WorkerDirs;
use std::path::Path;
use std::sync::Arc;

/// A tempdir-backed supervisor with rules-only judging and deny-all
/// escalation.
pub struct Supervisor {
    pub manager: Arc<WorkerManager>,
    pub config: Arc<SupervisorConfig>,
    _root: Option<tempfile::TempDir>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut SupervisorConfig)) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let mut supervisor = Self::with_root_and_config(root.path(), tweak);
        supervisor._root = Some(root);
        supervisor
    }

    /// Build over an existing directory the caller keeps alive (restart
    /// scenarios).
    pub fn with_root(root: &Path) -> Self {
        Self::with_root_and_config(root, |_| {})
    }

    fn with_root_and_config(root: &Path, tweak: impl FnOnce(&mut SupervisorConfig)) -> Self {
        let mut config = SupervisorConfig {
            workspace_root: root.to_path_buf(),
            execution_mode: ExecutionMode::SubprocessInShell,
            poll_interval_ms: 50,
            ..SupervisorConfig::default()
        };
        tweak(&mut config);
        let config = Arc::new(config);
        let engine = Arc::new(HybridEngine::new(&config, None));
        let manager = Arc::new(WorkerManager::new(
            Arc::clone(&config),
            engine,
            Arc::new(DenyAll),
            Arc::new(StatusAggregator::new()),
        ));
        Self { manager, config, _root: None }
    }

    pub fn dirs(&self, worker_id: &fm_core::WorkerId) -> WorkerDirs {
        self.manager.worker_dirs(worker_id).expect("worker dirs")
    }
}

pub fn read_transcript(dirs: &WorkerDirs) -> Vec<TranscriptEntry> {
    read_transcript_at(&dirs.transcript_path())
}

pub fn read_transcript_at(path: &Path) -> Vec<TranscriptEntry> {
    std::fs::read_to_string(path)
        .expect("transcript file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid transcript line"))
        .collect()
}

pub fn read_metrics(dirs: &WorkerDirs) -> Vec<serde_json::Value> {
    std::fs::read_to_string(dirs.metrics_path())
        .expect("metrics file")
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid metric line"))
        .collect()
}
