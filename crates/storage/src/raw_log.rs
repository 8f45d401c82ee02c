// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only writer for `raw_terminal.log`.
//!
//! Captures PTY bytes after ANSI-escape stripping and CR normalisation.
//! The file is plain UTF-8 text with `\n` framing; a trailing partial
//! line is completed when the writer is closed.

use crate::{StoreError, WorkerDirs};
use std::fs::{File, OpenOptions};
use std::io::Write;

pub struct RawLogWriter {
    file: File,
    strip_ansi: bool,
    /// Whether the last byte written was a newline
    at_line_start: bool,
}

impl RawLogWriter {
    pub fn open(dirs: &WorkerDirs, strip_ansi: bool) -> Result<Self, StoreError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dirs.raw_log_path())
            .map_err(|source| StoreError::Workspace { path: dirs.raw_log_path(), source })?;
        Ok(Self { file, strip_ansi, at_line_start: true })
    }

    /// Append one PTY chunk. Returns (bytes_written, complete_lines).
    pub fn append_chunk(&mut self, bytes: &[u8]) -> Result<(u64, u64), StoreError> {
        let cleaned = self.clean(bytes);
        if cleaned.is_empty() {
            return Ok((0, 0));
        }
        self.file.write_all(&cleaned)?;
        self.file.flush()?;
        let lines = cleaned.iter().filter(|b| **b == b'\n').count() as u64;
        self.at_line_start = cleaned.last() == Some(&b'\n');
        Ok((cleaned.len() as u64, lines))
    }

    /// Close out the file: terminate any dangling partial line.
    pub fn finish(&mut self) -> Result<(), StoreError> {
        if !self.at_line_start {
            self.file.write_all(b"\n")?;
            self.file.flush()?;
            self.at_line_start = true;
        }
        Ok(())
    }

    fn clean(&self, bytes: &[u8]) -> Vec<u8> {
        let stripped = if self.strip_ansi {
            strip_ansi_escapes::strip(bytes)
        } else {
            bytes.to_vec()
        };
        // Normalise CRLF / bare CR from the PTY to plain \n
        let mut out = Vec::with_capacity(stripped.len());
        let mut iter = stripped.iter().peekable();
        while let Some(&b) = iter.next() {
            if b == b'\r' {
                if iter.peek() != Some(&&b'\n') {
                    out.push(b'\n');
                }
            } else {
                out.push(b);
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "raw_log_tests.rs"]
mod tests;
