// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interactive dialogue loop.
//!
//! Two cooperating tasks per worker:
//!
//! - the *output poller* drains PTY chunks continuously, appending them to
//!   the raw log and the shared pending buffer, so no output is lost while
//!   a decision (or a five-minute escalation) is in flight;
//! - the *decision loop* waits for a pattern match, EOF, or the idle
//!   timer, asks the hybrid engine, and replies through stdin.
//!
//! The decision path is single-threaded per worker; ordering of transcript
//! entries follows from that.

use crate::escalation::{EscalationAnswer, EscalationHandler};
use crate::patterns::{ConfirmationMatcher, PendingBuffer, PromptMatch};
use crate::pty::PtySession;
use crate::status::StatusAggregator;
use crate::ManagerError;
use fm_core::{
    Clock, ConfirmationOutcome, ConfirmationRequest, Decision, DecisionAction, LifecycleEvent,
    MetricEvent, SupervisorConfig, WorkerId, WorkerState,
};
use fm_judge::HybridEngine;
use fm_storage::{MetricsWriter, RawLogWriter, TranscriptWriter};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// Why an interactive session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionResult {
    /// Worker exited with code 0
    Completed,
    /// Worker exited non-zero or lost its PTY
    Failed { exit_code: Option<i32> },
    /// Explicitly terminated
    Terminated,
    /// The confirmation budget was exhausted
    MaxIterations,
    /// No output within the idle window
    IdleTimeout,
}

/// Bytes of buffered output handed to the advisor as context.
const ADVISOR_CONTEXT_BYTES: usize = 2048;
/// Grace period for collecting the exit code after EOF and for soft
/// termination before the hard kill.
const EXIT_GRACE: Duration = Duration::from_secs(5);
/// Cadence of performance metric sampling.
const PERF_SAMPLE_EVERY: Duration = Duration::from_secs(30);

/// State shared between the poller and the decision loop.
pub(crate) struct SessionShared {
    buffer: Mutex<PendingBuffer>,
    data_notify: Notify,
    eof: AtomicBool,
    last_data_ms: AtomicU64,
    total_lines: AtomicU64,
}

impl SessionShared {
    fn new(now_ms: u64) -> Self {
        Self {
            buffer: Mutex::new(PendingBuffer::new()),
            data_notify: Notify::new(),
            eof: AtomicBool::new(false),
            last_data_ms: AtomicU64::new(now_ms),
            total_lines: AtomicU64::new(0),
        }
    }
}

pub(crate) struct SessionContext<C: Clock> {
    pub worker_id: WorkerId,
    pub config: Arc<SupervisorConfig>,
    pub engine: Arc<HybridEngine<C>>,
    pub escalation: Arc<dyn EscalationHandler>,
    pub status: Arc<StatusAggregator>,
    pub transcript: Arc<Mutex<TranscriptWriter>>,
    pub metrics: Arc<Mutex<MetricsWriter>>,
    pub matcher: Arc<ConfirmationMatcher>,
    pub cancel: CancellationToken,
    pub clock: C,
    pub start_ms: u64,
}

impl<C: Clock> SessionContext<C> {
    fn append_metric(&self, event: MetricEvent) {
        if let Err(e) = self.metrics.lock().append(&event) {
            tracing::warn!(worker_id = %self.worker_id, error = %e, "metric write failed");
        }
    }

    fn lifecycle(&self, event: LifecycleEvent, error: Option<String>) {
        record_lifecycle(
            &self.status,
            &self.transcript,
            &self.metrics,
            &self.worker_id,
            self.start_ms,
            self.clock.epoch_ms(),
            event,
            error,
        );
    }
}

/// Write one lifecycle event to the transcript and metrics files and
/// apply the matching status transition. Shared by the dialogue loop and
/// the manager's spawn/terminate paths.
#[allow(clippy::too_many_arguments)]
pub(crate) fn record_lifecycle(
    status: &StatusAggregator,
    transcript: &Mutex<TranscriptWriter>,
    metrics: &Mutex<MetricsWriter>,
    worker_id: &WorkerId,
    start_ms: u64,
    now_ms: u64,
    event: LifecycleEvent,
    error: Option<String>,
) {
    let state = match event {
        LifecycleEvent::Spawned => None,
        LifecycleEvent::Completed => Some(WorkerState::Completed),
        LifecycleEvent::Failed => Some(WorkerState::Failed),
        LifecycleEvent::Terminated => Some(WorkerState::Terminated),
    };
    if let Some(state) = state {
        status.update_state(worker_id, state, error.clone(), now_ms);
    }
    let content = match &error {
        Some(message) => format!("{event}: {message}"),
        None => event.to_string(),
    };
    if let Err(e) = transcript.lock().lifecycle(now_ms, &content) {
        tracing::warn!(%worker_id, error = %e, "lifecycle transcript write failed");
    }
    let duration_seconds = if event.is_terminal() {
        Some((now_ms.saturating_sub(start_ms)) as f64 / 1000.0)
    } else {
        None
    };
    let event = MetricEvent::WorkerLifecycle {
        timestamp: fm_core::iso_millis(now_ms),
        worker_id: worker_id.clone(),
        event,
        duration_seconds,
    };
    if let Err(e) = metrics.lock().append(&event) {
        tracing::warn!(%worker_id, error = %e, "metric write failed");
    }
}

pub(crate) struct InteractiveSession<C: Clock> {
    pub ctx: SessionContext<C>,
    pub pty: PtySession,
}

impl<C: Clock> InteractiveSession<C> {
    /// Run the dialogue loop until exit, termination, or a budget runs out.
    pub async fn run(
        mut self,
        raw_log: RawLogWriter,
        max_iterations: u64,
    ) -> Result<SessionResult, ManagerError> {
        let shared = Arc::new(SessionShared::new(self.ctx.clock.epoch_ms()));
        let output_rx = self.pty.take_output_rx();

        let poller = tokio::spawn(poll_output(PollerParams {
            worker_id: self.ctx.worker_id.clone(),
            output_rx,
            raw_log,
            shared: Arc::clone(&shared),
            status: Arc::clone(&self.ctx.status),
            metrics: Arc::clone(&self.ctx.metrics),
            poll_interval: Duration::from_millis(self.ctx.config.poll_interval_ms),
            clock_ms: {
                let clock = self.ctx.clock.clone();
                Arc::new(move || clock.epoch_ms())
            },
            pid: self.pty.pid(),
        }));

        let result = self.decision_loop(&shared, max_iterations).await;

        // Once the PTY is dead the reader thread closes the channel and
        // the poller exits on its own; the timeout is a backstop.
        let mut poller = poller;
        if tokio::time::timeout(EXIT_GRACE * 2, &mut poller).await.is_err() {
            poller.abort();
        }

        result
    }

    async fn decision_loop(
        &mut self,
        shared: &Arc<SessionShared>,
        max_iterations: u64,
    ) -> Result<SessionResult, ManagerError> {
        let poll_interval = Duration::from_millis(self.ctx.config.poll_interval_ms);
        let idle_limit = Duration::from_secs(self.ctx.config.per_worker_idle_timeout_s);
        let mut confirmations = 0u64;

        loop {
            if self.ctx.cancel.is_cancelled() {
                return Ok(self.finish_terminated(None).await);
            }

            let found = shared.buffer.lock().scan(&self.ctx.matcher);
            if let Some(found) = found {
                confirmations += 1;
                if confirmations > max_iterations {
                    return Ok(self.finish_terminated(Some("max iterations reached")).await);
                }
                match self.handle_confirmation(shared, found, confirmations).await {
                    Ok(()) => continue,
                    Err(ManagerError::WorkerLost(message)) => {
                        self.ctx.lifecycle(LifecycleEvent::Failed, Some(message));
                        return Ok(SessionResult::Failed { exit_code: None });
                    }
                    Err(other) => return Err(other),
                }
            }

            if shared.eof.load(Ordering::Acquire) {
                return Ok(self.finish_exited().await);
            }

            tokio::select! {
                _ = shared.data_notify.notified() => {}
                _ = self.ctx.cancel.cancelled() => {}
                _ = tokio::time::sleep(poll_interval) => {
                    let quiet_ms = self
                        .ctx
                        .clock
                        .epoch_ms()
                        .saturating_sub(shared.last_data_ms.load(Ordering::Relaxed));
                    if quiet_ms > idle_limit.as_millis() as u64 {
                        return Ok(self.finish_idle_timeout().await);
                    }
                }
            }
        }
    }

    async fn handle_confirmation(
        &mut self,
        shared: &Arc<SessionShared>,
        found: PromptMatch,
        number: u64,
    ) -> Result<(), ManagerError> {
        let now_ms = self.ctx.clock.epoch_ms();
        let worker_id = self.ctx.worker_id.clone();

        let mut request = ConfirmationRequest {
            worker_id: worker_id.clone(),
            kind: found.kind,
            prompt: found.prompt,
            details: found.details,
            seq: 0,
            timestamp_ms: now_ms,
        };
        let message = request.short_message();

        let entry = self
            .ctx
            .transcript
            .lock()
            .confirmation_request(now_ms, request.kind, &request.prompt, &message)?;
        request.seq = entry.seq;

        self.ctx.status.update_state(&worker_id, WorkerState::WaitingConfirmation, None, now_ms);
        self.ctx.status.update_confirmation_count(&worker_id, number, now_ms);

        let context = shared.buffer.lock().context_tail(ADVISOR_CONTEXT_BYTES).to_string();
        let decision = self.ctx.engine.decide(&request, &context).await;

        let (reply_action, outcome) = match decision.action {
            DecisionAction::Approve => (DecisionAction::Approve, ConfirmationOutcome::Approved),
            DecisionAction::Deny => (DecisionAction::Deny, ConfirmationOutcome::Denied),
            DecisionAction::Escalate => {
                (self.escalate(&request, &decision).await, ConfirmationOutcome::Escalated)
            }
        };

        let reply = self.ctx.config.reply_for(request.kind, reply_action).to_string();
        self.pty.write_line(&reply)?;

        let responded_ms = self.ctx.clock.epoch_ms();
        self.ctx.transcript.lock().confirmation_response(
            responded_ms,
            request.seq,
            request.kind,
            &reply,
            &message,
        )?;
        self.ctx.append_metric(MetricEvent::Confirmation {
            timestamp: fm_core::iso_millis(responded_ms),
            worker_id: worker_id.clone(),
            confirmation_number: number,
            orchestrator_latency_ms: decision.latency_ms,
            response: outcome,
            decided_by: decision.decided_by,
        });
        self.ctx.status.update_state(&worker_id, WorkerState::Running, None, responded_ms);
        Ok(())
    }

    /// Block on the host's escalation handler, bounded by the configured
    /// timeout; no answer means deny.
    async fn escalate(
        &mut self,
        request: &ConfirmationRequest,
        decision: &Decision,
    ) -> DecisionAction {
        let budget = Duration::from_secs(self.ctx.config.escalation_timeout_s);
        match tokio::time::timeout(
            budget,
            self.ctx.escalation.on_escalation(request, decision),
        )
        .await
        {
            Ok(EscalationAnswer::Approve) => DecisionAction::Approve,
            Ok(EscalationAnswer::Deny) => DecisionAction::Deny,
            Err(_) => {
                let now_ms = self.ctx.clock.epoch_ms();
                if let Err(e) = self.ctx.transcript.lock().note(
                    now_ms,
                    &format!(
                        "escalation timed out after {}s; denying (seq {})",
                        budget.as_secs(),
                        request.seq
                    ),
                ) {
                    tracing::warn!(worker_id = %request.worker_id, error = %e, "note write failed");
                }
                DecisionAction::Deny
            }
        }
    }

    async fn finish_exited(&mut self) -> SessionResult {
        match self.pty.wait_exit(EXIT_GRACE).await {
            Some(0) => {
                self.ctx.lifecycle(LifecycleEvent::Completed, None);
                SessionResult::Completed
            }
            Some(code) => {
                self.ctx
                    .lifecycle(LifecycleEvent::Failed, Some(format!("exit code {code}")));
                SessionResult::Failed { exit_code: Some(code) }
            }
            None => {
                self.ctx
                    .lifecycle(LifecycleEvent::Failed, Some("PTY closed, no exit code".into()));
                SessionResult::Failed { exit_code: None }
            }
        }
    }

    /// Soft terminate, bounded wait, then hard kill.
    async fn shutdown_pty(&mut self) {
        self.pty.soft_terminate();
        if self.pty.wait_exit(EXIT_GRACE).await.is_none() {
            self.pty.kill();
            let _ = self.pty.wait_exit(EXIT_GRACE).await;
        }
    }

    async fn finish_terminated(&mut self, reason: Option<&str>) -> SessionResult {
        self.shutdown_pty().await;
        self.ctx.lifecycle(LifecycleEvent::Terminated, reason.map(str::to_string));
        match reason {
            Some("max iterations reached") => SessionResult::MaxIterations,
            _ => SessionResult::Terminated,
        }
    }

    async fn finish_idle_timeout(&mut self) -> SessionResult {
        self.shutdown_pty().await;
        self.ctx.lifecycle(
            LifecycleEvent::Failed,
            Some(format!("no output for {}s", self.ctx.config.per_worker_idle_timeout_s)),
        );
        SessionResult::IdleTimeout
    }
}

struct PollerParams {
    worker_id: WorkerId,
    output_rx: mpsc::Receiver<Vec<u8>>,
    raw_log: RawLogWriter,
    shared: Arc<SessionShared>,
    status: Arc<StatusAggregator>,
    metrics: Arc<Mutex<MetricsWriter>>,
    poll_interval: Duration,
    clock_ms: Arc<dyn Fn() -> u64 + Send + Sync>,
    pid: Option<u32>,
}

/// Continuous output poller: never blocks on the decision path, so PTY
/// bytes reach the raw log even while an escalation is pending.
async fn poll_output(params: PollerParams) {
    let PollerParams {
        worker_id,
        mut output_rx,
        mut raw_log,
        shared,
        status,
        metrics,
        poll_interval,
        clock_ms,
        pid,
    } = params;

    let mut total_bytes = 0u64;
    let mut reported_lines = 0u64;
    let mut reported_bytes = 0u64;
    let mut running = false;
    let mut last_perf = tokio::time::Instant::now();

    loop {
        match tokio::time::timeout(poll_interval, output_rx.recv()).await {
            Ok(Some(chunk)) => {
                let (bytes, lines) = match raw_log.append_chunk(&chunk) {
                    Ok(counts) => counts,
                    Err(e) => {
                        tracing::warn!(%worker_id, error = %e, "raw log write failed");
                        (chunk.len() as u64, 0)
                    }
                };
                total_bytes += bytes;
                let total_lines = shared.total_lines.fetch_add(lines, Ordering::Relaxed) + lines;

                // The pending buffer always sees ANSI-stripped text
                let cleaned = strip_ansi_escapes::strip(&chunk);
                let text = String::from_utf8_lossy(&cleaned);
                if !text.trim().is_empty() && !running {
                    running = true;
                    status.update_state(&worker_id, WorkerState::Running, None, clock_ms());
                }
                shared.buffer.lock().push_str(&text);

                let now_ms = clock_ms();
                shared.last_data_ms.store(now_ms, Ordering::Relaxed);
                status.update_output_metrics(&worker_id, total_lines, now_ms);
                shared.data_notify.notify_one();
            }
            Ok(None) => {
                if let Err(e) = raw_log.finish() {
                    tracing::warn!(%worker_id, error = %e, "raw log close failed");
                }
                flush_output_metric(
                    &metrics,
                    &worker_id,
                    &clock_ms,
                    total_bytes,
                    shared.total_lines.load(Ordering::Relaxed),
                    &mut reported_bytes,
                    &mut reported_lines,
                );
                shared.eof.store(true, Ordering::Release);
                shared.data_notify.notify_one();
                return;
            }
            Err(_) => {
                // idle tick
            }
        }

        if last_perf.elapsed() >= PERF_SAMPLE_EVERY {
            last_perf = tokio::time::Instant::now();
            flush_output_metric(
                &metrics,
                &worker_id,
                &clock_ms,
                total_bytes,
                shared.total_lines.load(Ordering::Relaxed),
                &mut reported_bytes,
                &mut reported_lines,
            );
            if let Some(memory_mb) = pid.and_then(sample_memory_mb) {
                status.update_performance_metrics(&worker_id, memory_mb, None);
                let event = MetricEvent::Performance {
                    timestamp: fm_core::iso_millis(clock_ms()),
                    worker_id: worker_id.clone(),
                    memory_mb,
                    cpu_percent: None,
                };
                if let Err(e) = metrics.lock().append(&event) {
                    tracing::warn!(%worker_id, error = %e, "performance metric write failed");
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn flush_output_metric(
    metrics: &Arc<Mutex<MetricsWriter>>,
    worker_id: &WorkerId,
    clock_ms: &Arc<dyn Fn() -> u64 + Send + Sync>,
    total_bytes: u64,
    total_lines: u64,
    reported_bytes: &mut u64,
    reported_lines: &mut u64,
) {
    if total_bytes == *reported_bytes && total_lines == *reported_lines {
        return;
    }
    *reported_bytes = total_bytes;
    *reported_lines = total_lines;
    let event = MetricEvent::Output {
        timestamp: fm_core::iso_millis(clock_ms()),
        worker_id: worker_id.clone(),
        output_size_bytes: total_bytes,
        line_count: total_lines,
    };
    if let Err(e) = metrics.lock().append(&event) {
        tracing::warn!(%worker_id, error = %e, "output metric write failed");
    }
}

/// Resident set size of a process in megabytes, from procfs.
#[cfg(target_os = "linux")]
fn sample_memory_mb(pid: u32) -> Option<f64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: f64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb / 1024.0)
}

#[cfg(not(target_os = "linux"))]
fn sample_memory_mb(_pid: u32) -> Option<f64> {
    None
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
