// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY-backed worker subprocess.
//!
//! The child runs attached to a pseudo-terminal so interactive CLIs
//! behave as if a human were driving them. A dedicated reader thread does
//! the blocking PTY reads and forwards chunks over a bounded channel; it
//! never touches async code directly. Replies go back through the PTY
//! writer. Termination is soft first (SIGTERM), then the PTY killer.

use crate::ManagerError;
use fm_core::ExecutionMode;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Flags that would tell a worker to skip its own safety prompts. The
/// whole point of the supervisor is to answer those prompts, so spawning
/// with one of these is refused.
const FORBIDDEN_FLAGS: &[&str] =
    &["--dangerously-skip-permissions", "--skip-permissions", "--auto-approve-all", "--yolo"];

/// Outcome of one bounded PTY read.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Bytes arrived
    Chunk(Vec<u8>),
    /// Nothing within the timeout; the worker is quiet but alive
    Idle,
    /// PTY closed; the child has exited (or lost its terminal)
    Eof,
}

pub struct PtySession {
    child: Box<dyn portable_pty::Child + Send + Sync>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    writer: Box<dyn Write + Send>,
    output_rx: mpsc::Receiver<Vec<u8>>,
    pid: Option<u32>,
    // Held so the PTY pair outlives the reader thread
    _master: Box<dyn portable_pty::MasterPty + Send>,
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession").field("pid", &self.pid).finish()
    }
}

impl PtySession {
    /// Launch `command_template` on a fresh PTY.
    ///
    /// `native` mode splits the template on whitespace; `subprocess_in_shell`
    /// hands it to `sh -lc`. Never passes a skip-permissions flag; the
    /// worker must be allowed to ask.
    pub fn spawn(
        command_template: &str,
        mode: ExecutionMode,
        working_dir: &Path,
        env: &[(String, String)],
    ) -> Result<Self, ManagerError> {
        if let Some(flag) =
            FORBIDDEN_FLAGS.iter().find(|flag| command_template.contains(*flag))
        {
            return Err(ManagerError::ForbiddenFlag(flag.to_string()));
        }

        let pair = native_pty_system()
            .openpty(PtySize { rows: 40, cols: 120, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| ManagerError::Spawn(format!("openpty: {e}")))?;

        let mut cmd = match mode {
            ExecutionMode::Native => {
                let mut parts = command_template.split_whitespace();
                let Some(argv0) = parts.next() else {
                    return Err(ManagerError::Spawn("empty command template".to_string()));
                };
                let mut cmd = CommandBuilder::new(argv0);
                cmd.args(parts);
                cmd
            }
            ExecutionMode::SubprocessInShell => {
                let mut cmd = CommandBuilder::new("sh");
                cmd.args(["-lc", command_template]);
                cmd
            }
        };
        cmd.cwd(working_dir);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| ManagerError::Spawn(format!("spawn: {e}")))?;
        drop(pair.slave);

        let killer = child.clone_killer();
        let pid = child.process_id();

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| ManagerError::Spawn(format!("pty reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ManagerError::Spawn(format!("pty writer: {e}")))?;

        // Blocking reads happen on this thread only; chunks cross into the
        // async world over a bounded channel.
        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(64);
        std::thread::Builder::new()
            .name("pty-reader".to_string())
            .spawn(move || {
                let mut buf = [0u8; 4096];
                let mut failures = 0u32;
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            failures = 0;
                            if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(_) => {
                            // transient PTY errors are retried with backoff
                            failures += 1;
                            if failures > 3 {
                                break;
                            }
                            std::thread::sleep(Duration::from_millis(50 * failures as u64));
                        }
                    }
                }
            })
            .map_err(|e| ManagerError::Spawn(format!("reader thread: {e}")))?;

        Ok(Self { child, killer, writer, output_rx, pid, _master: pair.master })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Hand the output stream to a dedicated poller task. Subsequent
    /// `read_chunk` calls on this session would see EOF; callers split
    /// reads from writes exactly once.
    pub fn take_output_rx(&mut self) -> mpsc::Receiver<Vec<u8>> {
        let (_, empty_rx) = mpsc::channel(1);
        std::mem::replace(&mut self.output_rx, empty_rx)
    }

    /// Wait up to `timeout` for the next output chunk.
    pub async fn read_chunk(&mut self, timeout: Duration) -> ReadOutcome {
        match tokio::time::timeout(timeout, self.output_rx.recv()).await {
            Ok(Some(chunk)) => ReadOutcome::Chunk(chunk),
            Ok(None) => ReadOutcome::Eof,
            Err(_) => ReadOutcome::Idle,
        }
    }

    /// Write one reply line to the worker's stdin.
    pub fn write_line(&mut self, line: &str) -> Result<(), ManagerError> {
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.write_all(b"\n"))
            .and_then(|()| self.writer.flush())
            .map_err(|e| ManagerError::WorkerLost(format!("stdin write: {e}")))
    }

    /// Exit code if the child has already exited.
    pub fn try_exit_code(&mut self) -> Option<i32> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(status.exit_code() as i32),
            Ok(None) => None,
            Err(_) => Some(-1),
        }
    }

    /// Poll for the exit code up to `grace`.
    pub async fn wait_exit(&mut self, grace: Duration) -> Option<i32> {
        let deadline = tokio::time::Instant::now() + grace;
        loop {
            if let Some(code) = self.try_exit_code() {
                return Some(code);
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    /// Ask the child to exit (SIGTERM on unix). Harmless if already gone.
    pub fn soft_terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.pid {
            let _ = nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid as i32),
                nix::sys::signal::Signal::SIGTERM,
            );
            return;
        }
        let _ = self.killer.kill();
    }

    /// Force the child down. Idempotent.
    pub fn kill(&mut self) {
        let _ = self.killer.kill();
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
