// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only writer for `dialogue_transcript.jsonl`.
//!
//! One JSON object per line, flushed on every write. Timestamps within a
//! file are strictly increasing: entries landing in the same millisecond
//! are bumped forward by 1 ms. `seq` increases per entry, except that a
//! confirmation response echoes the seq of the request it answers.

use crate::{StoreError, WorkerDirs};
use fm_core::{iso_millis, ConfirmationKind, TranscriptEntry, WorkerId};
use std::fs::{File, OpenOptions};
use std::io::Write;

pub struct TranscriptWriter {
    file: File,
    worker_id: WorkerId,
    seq: u64,
    last_ts_ms: u64,
}

impl TranscriptWriter {
    pub fn open(dirs: &WorkerDirs, worker_id: WorkerId) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dirs.transcript_path())
            .map_err(|source| StoreError::Workspace { path: dirs.transcript_path(), source })?;
        Ok(Self { file, worker_id, seq: 0, last_ts_ms: 0 })
    }

    /// Next strictly-increasing timestamp for this file.
    fn stamp(&mut self, now_ms: u64) -> String {
        let ts = now_ms.max(self.last_ts_ms + 1);
        self.last_ts_ms = ts;
        iso_millis(ts)
    }

    fn write_entry(&mut self, entry: &TranscriptEntry) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        line.push('\n');
        self.file.write_all(line.as_bytes())?;
        self.file.flush()?;
        Ok(())
    }

    /// Record worker output.
    pub fn output(&mut self, now_ms: u64, content: &str) -> Result<TranscriptEntry, StoreError> {
        self.seq += 1;
        let entry =
            TranscriptEntry::output(self.worker_id.clone(), self.stamp(now_ms), self.seq, content);
        self.write_entry(&entry)?;
        Ok(entry)
    }

    /// Record a recognised confirmation prompt. Returns the entry; its
    /// `seq` pairs the eventual response.
    pub fn confirmation_request(
        &mut self,
        now_ms: u64,
        kind: ConfirmationKind,
        prompt: &str,
        message: &str,
    ) -> Result<TranscriptEntry, StoreError> {
        self.seq += 1;
        let entry = TranscriptEntry::confirmation_request(
            self.worker_id.clone(),
            self.stamp(now_ms),
            self.seq,
            kind,
            prompt,
            message,
        );
        self.write_entry(&entry)?;
        Ok(entry)
    }

    /// Record the reply written to the worker, echoing the request's seq.
    pub fn confirmation_response(
        &mut self,
        now_ms: u64,
        request_seq: u64,
        kind: ConfirmationKind,
        reply: &str,
        message: &str,
    ) -> Result<TranscriptEntry, StoreError> {
        let entry = TranscriptEntry::confirmation_response(
            self.worker_id.clone(),
            self.stamp(now_ms),
            request_seq,
            kind,
            reply,
            message,
        );
        self.write_entry(&entry)?;
        Ok(entry)
    }

    /// Record a lifecycle marker (spawned, completed, failed, terminated).
    pub fn lifecycle(&mut self, now_ms: u64, content: &str) -> Result<TranscriptEntry, StoreError> {
        self.seq += 1;
        let entry = TranscriptEntry::lifecycle(
            self.worker_id.clone(),
            self.stamp(now_ms),
            self.seq,
            content,
        );
        self.write_entry(&entry)?;
        Ok(entry)
    }

    /// Record a supervisor-side annotation.
    pub fn note(&mut self, now_ms: u64, content: &str) -> Result<TranscriptEntry, StoreError> {
        self.seq += 1;
        let entry =
            TranscriptEntry::note(self.worker_id.clone(), self.stamp(now_ms), self.seq, content);
        self.write_entry(&entry)?;
        Ok(entry)
    }
}

#[cfg(test)]
#[path = "transcript_writer_tests.rs"]
mod tests;
