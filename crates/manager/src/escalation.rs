// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Escalation seam between the supervisor and its host.
//!
//! The host installs one handler at startup. The dialogue loop blocks on
//! it up to `escalation_timeout_s`; on timeout the effective answer is
//! deny, recorded with a `note` transcript entry.

use async_trait::async_trait;
use fm_core::{ConfirmationRequest, Decision};

/// Answer returned by the human (or host automation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationAnswer {
    Approve,
    Deny,
}

/// Host-installed callback for decisions the policy refuses to automate.
#[async_trait]
pub trait EscalationHandler: Send + Sync {
    async fn on_escalation(
        &self,
        request: &ConfirmationRequest,
        decision: &Decision,
    ) -> EscalationAnswer;
}

/// Default handler: deny everything immediately. Used when no host
/// handler is installed and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl EscalationHandler for DenyAll {
    async fn on_escalation(
        &self,
        _request: &ConfirmationRequest,
        _decision: &Decision,
    ) -> EscalationAnswer {
        EscalationAnswer::Deny
    }
}
