// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-resort template responder.
//!
//! Hard-coded conservative default per request kind, used when both the
//! rule engine and the advisor have failed to produce a verdict. Never
//! approves anything it cannot see is routine.

use fm_core::{ConfirmationKind, DecidedBy, Decision, DecisionAction, SafetyLevel};

#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateResponder;

impl TemplateResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn respond(&self, kind: ConfirmationKind) -> Decision {
        let (level, action, reasoning) = match kind {
            ConfirmationKind::FileWrite => (
                SafetyLevel::Caution,
                DecisionAction::Approve,
                "template default: file writes inside the workspace are routine",
            ),
            ConfirmationKind::FileDelete => (
                SafetyLevel::Dangerous,
                DecisionAction::Escalate,
                "template default: deletions need a human",
            ),
            ConfirmationKind::CommandExecute => (
                SafetyLevel::Dangerous,
                DecisionAction::Escalate,
                "template default: unvetted commands need a human",
            ),
            ConfirmationKind::PackageInstall => (
                SafetyLevel::Caution,
                DecisionAction::Approve,
                "template default: registry installs are routine",
            ),
            ConfirmationKind::GenericYesNo => (
                SafetyLevel::Unknown,
                DecisionAction::Escalate,
                "template default: unclassified prompt needs a human",
            ),
            ConfirmationKind::Unknown => (
                SafetyLevel::Unknown,
                DecisionAction::Escalate,
                "template default: unrecognised prompt needs a human",
            ),
        };
        Decision::new(level, action, DecidedBy::Template, reasoning)
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
