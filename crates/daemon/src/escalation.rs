// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default escalation handler: desktop notification, then wait.
//!
//! The daemon has no chat surface of its own; a host embedding the
//! library installs a real handler. This default posts a notification so
//! a human at the machine knows attention is needed, then never answers —
//! the session's escalation timeout converts that into a recorded deny.

use async_trait::async_trait;
use fm_core::{ConfirmationRequest, Decision};
use fm_manager::{EscalationAnswer, EscalationHandler};

pub struct NotifyEscalation;

impl NotifyEscalation {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NotifyEscalation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EscalationHandler for NotifyEscalation {
    async fn on_escalation(
        &self,
        request: &ConfirmationRequest,
        decision: &Decision,
    ) -> EscalationAnswer {
        let summary = format!("Decision needed: {}", request.worker_id);
        let body = format!("{} — {}", request.short_message(), decision.reasoning);
        if let Err(e) = notify_rust::Notification::new()
            .summary(&summary)
            .body(&body)
            .show()
        {
            tracing::debug!(error = %e, "desktop notification failed");
        }
        tracing::warn!(
            worker_id = %request.worker_id,
            kind = %request.kind,
            reasoning = %decision.reasoning,
            "escalation pending, no handler installed; will deny on timeout"
        );
        std::future::pending().await
    }
}
