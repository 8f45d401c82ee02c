// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only writer for `metrics.jsonl`.

use crate::{StoreError, WorkerDirs};
use fm_core::MetricEvent;
use std::fs::{File, OpenOptions};
use std::io::Write;

pub struct MetricsWriter {
    file: File,
}

impl MetricsWriter {
    pub fn open(dirs: &WorkerDirs) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dirs.metrics_path())
            .map_err(|source| StoreError::Workspace { path: dirs.metrics_path(), source })?;
        Ok(Self { file })
    }

    pub fn append(&mut self, event: &MetricEvent) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(event).map_err(std::io::Error::other)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "metrics_writer_tests.rs"]
mod tests;
