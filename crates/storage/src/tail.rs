// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Offset-tracking line reader for append-only files.
//!
//! Reads only content appended since the last call and never consumes a
//! partial final line: the offset stops before any line that does not yet
//! end in `\n`, so a crash mid-write is invisible to readers.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub struct TailReader {
    path: PathBuf,
    offset: u64,
}

impl TailReader {
    /// Start tailing from the beginning of the file.
    pub fn from_start(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), offset: 0 }
    }

    /// Current byte offset (start of the first unread line).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read all complete lines appended since the last call.
    ///
    /// A missing file yields no lines. External truncation resets the
    /// offset to the new start of file.
    pub fn read_new_lines(&mut self) -> std::io::Result<Vec<String>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        if file_len < self.offset {
            self.offset = 0;
        }
        if file_len == self.offset {
            return Ok(Vec::new());
        }

        let mut reader = BufReader::new(file);
        reader.seek(SeekFrom::Start(self.offset))?;

        let mut lines = Vec::new();
        let mut buf = String::new();
        loop {
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if !buf.ends_with('\n') {
                        // Partial final line: leave it for the next call
                        break;
                    }
                    self.offset += n as u64;
                    let line = buf.trim_end_matches(['\n', '\r']);
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Ok(lines)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "tail_tests.rs"]
mod tests;
