// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hybrid decision engine.
//!
//! Routes every confirmation request to the cheapest classifier that can
//! answer it: rules first (authoritative when they speak), then the AI
//! advisor under a timeout, then the template responder. Also the home of
//! the aggregate decision counters served by `/api/v1/metrics/current` and
//! the bounded recent-decisions ring behind `/api/v1/decisions/recent`.

use crate::advisor::SafetyAdvisor;
use crate::rules::RuleEngine;
use crate::template::TemplateResponder;
use fm_core::{
    iso_millis, Clock, ConfirmationKind, ConfirmationRequest, DecidedBy, Decision, DecisionAction,
    SafetyLevel, SupervisorConfig, SystemClock, WorkerId,
};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Most recent decisions kept for the REST surface.
const RECENT_CAP: usize = 1000;

/// One decision as served by `/api/v1/decisions/recent`.
#[derive(Debug, Clone, Serialize)]
pub struct RecentDecision {
    pub timestamp: String,
    pub worker_id: WorkerId,
    pub decision_type: DecisionAction,
    pub decided_by: DecidedBy,
    pub latency_ms: u64,
    pub is_fallback: bool,
    pub confirmation_type: ConfirmationKind,
    pub reasoning: String,
}

/// Aggregate counters as served by `/api/v1/metrics/current`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_decisions: u64,
    pub rules_decisions: u64,
    pub ai_decisions: u64,
    pub template_fallbacks: u64,
    pub average_latency_ms: f64,
    pub rules_percentage: f64,
}

#[derive(Default)]
struct LogInner {
    total: u64,
    rules: u64,
    ai: u64,
    template: u64,
    latency_total_ms: u64,
    recent: VecDeque<RecentDecision>,
}

/// Aggregate decision log. Stateless engine aside, this is the only
/// cross-request state the judge keeps; guarded by a single lock.
#[derive(Default)]
pub struct DecisionLog {
    inner: Mutex<LogInner>,
}

impl DecisionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, request: &ConfirmationRequest, decision: &Decision, now_ms: u64) {
        let mut inner = self.inner.lock();
        inner.total += 1;
        match decision.decided_by {
            DecidedBy::Rules => inner.rules += 1,
            DecidedBy::Ai => inner.ai += 1,
            DecidedBy::Template => inner.template += 1,
        }
        inner.latency_total_ms += decision.latency_ms;
        if inner.recent.len() >= RECENT_CAP {
            inner.recent.pop_front();
        }
        inner.recent.push_back(RecentDecision {
            timestamp: iso_millis(now_ms),
            worker_id: request.worker_id.clone(),
            decision_type: decision.action,
            decided_by: decision.decided_by,
            latency_ms: decision.latency_ms,
            is_fallback: decision.decided_by == DecidedBy::Template,
            confirmation_type: request.kind,
            reasoning: decision.reasoning.clone(),
        });
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        let average_latency_ms = if inner.total > 0 {
            inner.latency_total_ms as f64 / inner.total as f64
        } else {
            0.0
        };
        let rules_percentage = if inner.total > 0 {
            inner.rules as f64 * 100.0 / inner.total as f64
        } else {
            0.0
        };
        MetricsSnapshot {
            total_decisions: inner.total,
            rules_decisions: inner.rules,
            ai_decisions: inner.ai,
            template_fallbacks: inner.template,
            average_latency_ms,
            rules_percentage,
        }
    }

    /// Up to `limit` most recent decisions, newest first.
    pub fn recent(&self, limit: usize) -> Vec<RecentDecision> {
        let inner = self.inner.lock();
        inner.recent.iter().rev().take(limit).cloned().collect()
    }
}

/// The three-layer decision pipeline.
pub struct HybridEngine<C: Clock = SystemClock> {
    rules: RuleEngine,
    advisor: Option<Arc<dyn SafetyAdvisor>>,
    template: TemplateResponder,
    log: Arc<DecisionLog>,
    advisor_timeout: Duration,
    clock: C,
}

impl HybridEngine<SystemClock> {
    pub fn new(config: &SupervisorConfig, advisor: Option<Arc<dyn SafetyAdvisor>>) -> Self {
        Self::with_clock(config, advisor, SystemClock)
    }
}

impl<C: Clock> HybridEngine<C> {
    pub fn with_clock(
        config: &SupervisorConfig,
        advisor: Option<Arc<dyn SafetyAdvisor>>,
        clock: C,
    ) -> Self {
        Self {
            rules: RuleEngine::new(config),
            advisor,
            template: TemplateResponder::new(),
            log: Arc::new(DecisionLog::new()),
            advisor_timeout: Duration::from_millis(config.ai_advisor_timeout_ms),
            clock,
        }
    }

    /// Shared handle to the aggregate log, for the gateway.
    pub fn log(&self) -> Arc<DecisionLog> {
        Arc::clone(&self.log)
    }

    /// Decide on one request. `context` is a bounded window of recent
    /// transcript text handed to the advisor.
    ///
    /// Never fails: every error path degrades to the next layer and
    /// ultimately to the template's conservative default.
    pub async fn decide(&self, request: &ConfirmationRequest, context: &str) -> Decision {
        let started = self.clock.now();

        let mut decision = self.rules.evaluate(request);
        if decision.level == SafetyLevel::Unknown {
            decision = self.consult_advisor(request, context).await;
        }

        let latency_ms = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_millis() as u64;
        let decision = decision.latency_ms(latency_ms);
        self.log.record(request, &decision, self.clock.epoch_ms());
        decision
    }

    async fn consult_advisor(&self, request: &ConfirmationRequest, context: &str) -> Decision {
        let Some(advisor) = &self.advisor else {
            return self.template.respond(request.kind);
        };
        match tokio::time::timeout(self.advisor_timeout, advisor.advise(request, context)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!(worker_id = %request.worker_id, error = %e, "advisor failed, using template");
                self.template.respond(request.kind)
            }
            Err(_) => {
                tracing::warn!(worker_id = %request.worker_id, timeout_ms = self.advisor_timeout.as_millis() as u64, "advisor timed out, using template");
                self.template.respond(request.kind)
            }
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
