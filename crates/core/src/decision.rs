// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Safety decisions rendered on confirmation requests.

use serde::{Deserialize, Serialize};

/// Safety classification of a confirmation request.
///
/// `Unknown` means the classifier abstained; the hybrid engine treats it
/// as "consult the next layer", never as a final verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    Safe,
    Caution,
    Dangerous,
    Prohibited,
    Unknown,
}

crate::simple_display! {
    SafetyLevel {
        Safe => "SAFE",
        Caution => "CAUTION",
        Dangerous => "DANGEROUS",
        Prohibited => "PROHIBITED",
        Unknown => "UNKNOWN",
    }
}

/// What the supervisor does with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Approve,
    Deny,
    Escalate,
}

crate::simple_display! {
    DecisionAction {
        Approve => "approve",
        Deny => "deny",
        Escalate => "escalate",
    }
}

/// Which layer of the hybrid engine produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidedBy {
    Rules,
    Ai,
    Template,
}

crate::simple_display! {
    DecidedBy {
        Rules => "rules",
        Ai => "ai",
        Template => "template",
    }
}

/// Outcome as recorded in confirmation metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationOutcome {
    Approved,
    Denied,
    Escalated,
}

crate::simple_display! {
    ConfirmationOutcome {
        Approved => "approved",
        Denied => "denied",
        Escalated => "escalated",
    }
}

impl From<DecisionAction> for ConfirmationOutcome {
    fn from(action: DecisionAction) -> Self {
        match action {
            DecisionAction::Approve => Self::Approved,
            DecisionAction::Deny => Self::Denied,
            DecisionAction::Escalate => Self::Escalated,
        }
    }
}

/// A rendered safety decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub level: SafetyLevel,
    pub action: DecisionAction,
    pub decided_by: DecidedBy,
    /// Which rule fired / why the advisor decided what it did
    pub reasoning: String,
    pub latency_ms: u64,
    /// Safer variant the requester could retry with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_modification: Option<String>,
}

impl Decision {
    pub fn new(
        level: SafetyLevel,
        action: DecisionAction,
        decided_by: DecidedBy,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            level,
            action,
            decided_by,
            reasoning: reasoning.into(),
            latency_ms: 0,
            suggested_modification: None,
        }
    }

    crate::setters! {
        set {
            latency_ms: u64,
        }
    }

    /// Attach a suggested modification.
    pub fn suggest(mut self, modification: impl Into<String>) -> Self {
        self.suggested_modification = Some(modification.into());
        self
    }

    /// Whether level/action together honour the policy invariants:
    /// PROHIBITED forces deny, and Unknown is never a final verdict
    /// paired with approve.
    pub fn respects_policy(&self) -> bool {
        match self.level {
            SafetyLevel::Prohibited => self.action == DecisionAction::Deny,
            SafetyLevel::Unknown => self.action != DecisionAction::Approve,
            _ => true,
        }
    }
}

#[cfg(test)]
#[path = "decision_tests.rs"]
mod tests;
