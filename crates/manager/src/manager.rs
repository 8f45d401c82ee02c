// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker manager: spawn, run, terminate, snapshot.
//!
//! Exclusively owns worker records and their PTY handles, and is the sole
//! writer of every per-worker file. The streaming side (file monitor,
//! gateway) interacts with workers only through those files.

use crate::escalation::EscalationHandler;
use crate::patterns::ConfirmationMatcher;
use crate::pty::PtySession;
use crate::session::{record_lifecycle, InteractiveSession, SessionContext, SessionResult};
use crate::status::{StatusAggregator, WorkerStatus};
use crate::ManagerError;
use fm_core::{Clock, LifecycleEvent, SupervisorConfig, SystemClock, WorkerId};
use fm_judge::HybridEngine;
use fm_storage::{MetricsWriter, RawLogWriter, TranscriptWriter, WorkerDirs};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything needed to launch one worker.
#[derive(Debug, Clone)]
pub struct SpawnSpec {
    pub worker_id: WorkerId,
    pub task: String,
    pub command_template: String,
    pub env: Vec<(String, String)>,
    /// Defaults to the worker's workspace directory
    pub working_dir: Option<PathBuf>,
}

impl SpawnSpec {
    pub fn new(worker_id: impl Into<WorkerId>, command_template: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            task: String::new(),
            command_template: command_template.into(),
            env: Vec::new(),
            working_dir: None,
        }
    }

    /// Spec with a generated `wkr-<hex>` id.
    pub fn with_generated_id(command_template: impl Into<String>) -> Self {
        let id = format!("wkr-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        Self::new(id, command_template)
    }

    fm_core::setters! {
        into {
            task: String,
        }
        set {
            env: Vec<(String, String)>,
        }
        option {
            working_dir: PathBuf,
        }
    }
}

struct PendingSession {
    pty: PtySession,
    raw_log: RawLogWriter,
}

struct WorkerHandle {
    cancel: CancellationToken,
    pending: Option<PendingSession>,
    dirs: WorkerDirs,
    transcript: Arc<Mutex<TranscriptWriter>>,
    metrics: Arc<Mutex<MetricsWriter>>,
    start_ms: u64,
}

pub struct WorkerManager<C: Clock = SystemClock> {
    config: Arc<SupervisorConfig>,
    engine: Arc<HybridEngine<C>>,
    escalation: Arc<dyn EscalationHandler>,
    status: Arc<StatusAggregator>,
    matcher: Arc<ConfirmationMatcher>,
    clock: C,
    workers: Mutex<HashMap<WorkerId, WorkerHandle>>,
}

impl WorkerManager<SystemClock> {
    pub fn new(
        config: Arc<SupervisorConfig>,
        engine: Arc<HybridEngine<SystemClock>>,
        escalation: Arc<dyn EscalationHandler>,
        status: Arc<StatusAggregator>,
    ) -> Self {
        Self::with_clock(config, engine, escalation, status, SystemClock)
    }
}

impl<C: Clock> WorkerManager<C> {
    pub fn with_clock(
        config: Arc<SupervisorConfig>,
        engine: Arc<HybridEngine<C>>,
        escalation: Arc<dyn EscalationHandler>,
        status: Arc<StatusAggregator>,
        clock: C,
    ) -> Self {
        Self {
            config,
            engine,
            escalation,
            status,
            matcher: Arc::new(ConfirmationMatcher::new()),
            clock,
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Launch a worker: workspace directory, the three append-only files,
    /// and the PTY subprocess. Emits the `spawned` lifecycle event.
    pub fn spawn(&self, spec: SpawnSpec) -> Result<WorkerId, ManagerError> {
        let now_ms = self.clock.epoch_ms();
        let worker_id = spec.worker_id.clone();

        {
            let workers = self.workers.lock();
            if workers.contains_key(&worker_id) {
                return Err(ManagerError::DuplicateWorker(worker_id));
            }
            let active = self.status.get_summary(now_ms).active_workers;
            if active as u32 >= self.config.max_workers {
                return Err(ManagerError::MaxWorkers(self.config.max_workers));
            }
        }

        let dirs = WorkerDirs::new(&self.config.workspace_root, &worker_id)?;
        dirs.init(Some(&spec.task))?;

        let transcript = Arc::new(Mutex::new(TranscriptWriter::open(&dirs, worker_id.clone())?));
        let metrics = Arc::new(Mutex::new(MetricsWriter::open(&dirs)?));
        let raw_log = RawLogWriter::open(&dirs, self.config.raw_log_ansi_strip)?;

        let working_dir = spec.working_dir.clone().unwrap_or_else(|| dirs.dir().to_path_buf());
        let pty = PtySession::spawn(
            &spec.command_template,
            self.config.execution_mode,
            &working_dir,
            &spec.env,
        )?;

        self.status.register(worker_id.clone(), &spec.task, now_ms);
        record_lifecycle(
            &self.status,
            &transcript,
            &metrics,
            &worker_id,
            now_ms,
            now_ms,
            LifecycleEvent::Spawned,
            None,
        );

        self.workers.lock().insert(
            worker_id.clone(),
            WorkerHandle {
                cancel: CancellationToken::new(),
                pending: Some(PendingSession { pty, raw_log }),
                dirs,
                transcript,
                metrics,
                start_ms: now_ms,
            },
        );
        tracing::info!(%worker_id, "worker spawned");
        Ok(worker_id)
    }

    /// Run the dialogue loop for a spawned worker until it exits, is
    /// terminated, or exhausts `max_iterations` confirmations.
    pub async fn run_interactive_session(
        &self,
        worker_id: &WorkerId,
        max_iterations: u64,
    ) -> Result<SessionResult, ManagerError> {
        let (pending, ctx) = {
            let mut workers = self.workers.lock();
            let handle = workers
                .get_mut(worker_id)
                .ok_or_else(|| ManagerError::UnknownWorker(worker_id.clone()))?;
            let pending = handle
                .pending
                .take()
                .ok_or_else(|| ManagerError::SessionUnavailable(worker_id.clone()))?;
            let ctx = SessionContext {
                worker_id: worker_id.clone(),
                config: Arc::clone(&self.config),
                engine: Arc::clone(&self.engine),
                escalation: Arc::clone(&self.escalation),
                status: Arc::clone(&self.status),
                transcript: Arc::clone(&handle.transcript),
                metrics: Arc::clone(&handle.metrics),
                matcher: Arc::clone(&self.matcher),
                cancel: handle.cancel.clone(),
                clock: self.clock.clone(),
                start_ms: handle.start_ms,
            };
            (pending, ctx)
        };

        let session = InteractiveSession { ctx, pty: pending.pty };
        let result = session.run(pending.raw_log, max_iterations).await;
        tracing::info!(%worker_id, result = ?result, "interactive session ended");
        result
    }

    /// Terminate a worker. Idempotent: a worker already in a terminal
    /// state is left untouched and no second lifecycle event is written.
    pub async fn terminate(&self, worker_id: &WorkerId, reason: &str) -> Result<(), ManagerError> {
        let now_ms = self.clock.epoch_ms();
        let Some(current) = self.status.get_status(worker_id, now_ms) else {
            return Err(ManagerError::UnknownWorker(worker_id.clone()));
        };
        if current.state.is_terminal() {
            return Ok(());
        }

        // A session that never started is torn down directly
        let direct = {
            let mut workers = self.workers.lock();
            let handle = workers
                .get_mut(worker_id)
                .ok_or_else(|| ManagerError::UnknownWorker(worker_id.clone()))?;
            handle.cancel.cancel();
            handle.pending.take().map(|pending| {
                (pending, Arc::clone(&handle.transcript), Arc::clone(&handle.metrics), handle.start_ms)
            })
        };

        if let Some((mut pending, transcript, metrics, start_ms)) = direct {
            pending.pty.soft_terminate();
            if pending.pty.wait_exit(Duration::from_secs(5)).await.is_none() {
                pending.pty.kill();
                let _ = pending.pty.wait_exit(Duration::from_secs(5)).await;
            }
            record_lifecycle(
                &self.status,
                &transcript,
                &metrics,
                worker_id,
                start_ms,
                self.clock.epoch_ms(),
                LifecycleEvent::Terminated,
                Some(reason.to_string()),
            );
            tracing::info!(%worker_id, reason, "worker terminated before session start");
            return Ok(());
        }

        // Otherwise the cancelled dialogue loop shuts the worker down;
        // wait for it within the grace budget, then force the record.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(12);
        loop {
            let state = self
                .status
                .get_status(worker_id, self.clock.epoch_ms())
                .map(|s| s.state);
            match state {
                Some(state) if state.is_terminal() => return Ok(()),
                None => return Ok(()),
                _ if tokio::time::Instant::now() >= deadline => break,
                _ => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }

        tracing::warn!(%worker_id, "session did not exit within grace, forcing terminated record");
        let (transcript, metrics, start_ms) = {
            let workers = self.workers.lock();
            let handle = workers
                .get(worker_id)
                .ok_or_else(|| ManagerError::UnknownWorker(worker_id.clone()))?;
            (Arc::clone(&handle.transcript), Arc::clone(&handle.metrics), handle.start_ms)
        };
        record_lifecycle(
            &self.status,
            &transcript,
            &metrics,
            worker_id,
            start_ms,
            self.clock.epoch_ms(),
            LifecycleEvent::Terminated,
            Some(reason.to_string()),
        );
        Ok(())
    }

    /// Snapshot of all workers.
    pub fn list_workers(&self) -> Vec<WorkerStatus> {
        self.status.list_all(self.clock.epoch_ms())
    }

    /// Snapshot of one worker.
    pub fn get_status(&self, worker_id: &WorkerId) -> Option<WorkerStatus> {
        self.status.get_status(worker_id, self.clock.epoch_ms())
    }

    /// Shared status registry, for the gateway.
    pub fn status(&self) -> Arc<StatusAggregator> {
        Arc::clone(&self.status)
    }

    /// On-disk layout for a worker, for tailing its files.
    pub fn worker_dirs(&self, worker_id: &WorkerId) -> Option<WorkerDirs> {
        self.workers.lock().get(worker_id).map(|handle| handle.dirs.clone())
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
