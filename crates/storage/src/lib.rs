// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-storage: the transcript store and file monitor.
//!
//! The worker manager is the sole writer of three append-only files per
//! worker (`dialogue_transcript.jsonl`, `raw_terminal.log`, `metrics.jsonl`);
//! everything downstream — the file monitor's tailers, the gateway's
//! snapshot reads — is strictly a reader and tolerates a partial final line.

pub mod dirs;
pub mod metrics_writer;
pub mod monitor;
pub mod raw_log;
pub mod tail;
pub mod transcript_writer;

pub use dirs::{validate_worker_id, WorkerDirs};
pub use metrics_writer::MetricsWriter;
pub use monitor::{FileKind, FileMonitor, StreamFrame, Subscription};
pub use raw_log::RawLogWriter;
pub use tail::TailReader;
pub use transcript_writer::TranscriptWriter;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the transcript store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("workspace error at {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    #[error("invalid worker id {0:?}")]
    InvalidWorkerId(String),
}
