// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AI advisor seam.
//!
//! Consulted only when the rule engine abstains. The advisor receives a
//! compact snapshot of the request (never the live session) and must answer
//! within the configured timeout with a JSON verdict of fixed shape:
//! `{"level": "...", "action": "...", "reasoning": "..."}`.

use async_trait::async_trait;
use fm_core::{ConfirmationRequest, DecidedBy, Decision, DecisionAction, SafetyLevel};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from consulting an advisor. All of them cause the hybrid engine
/// to fall through to the template responder.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("advisor returned status {0}")]
    Status(u16),

    #[error("advisor response malformed: {0}")]
    Malformed(String),
}

/// External safety classifier consulted when rules abstain.
#[async_trait]
pub trait SafetyAdvisor: Send + Sync {
    /// Render a verdict on the request. `context` is a bounded window of
    /// recent transcript text surrounding the prompt.
    async fn advise(
        &self,
        request: &ConfirmationRequest,
        context: &str,
    ) -> Result<Decision, AdvisorError>;
}

/// Wire shape of the advisor call.
#[derive(Debug, Serialize)]
struct AdvisorQuery<'a> {
    kind: &'a str,
    prompt: &'a str,
    details: &'a indexmap::IndexMap<String, String>,
    workspace_root: &'a str,
    context: &'a str,
}

/// Wire shape of the advisor answer.
#[derive(Debug, Deserialize)]
struct AdvisorVerdict {
    level: SafetyLevel,
    action: DecisionAction,
    reasoning: String,
    #[serde(default)]
    suggested_modification: Option<String>,
}

/// HTTP-backed advisor posting the query to a single endpoint.
pub struct HttpAdvisor {
    client: reqwest::Client,
    endpoint: String,
    workspace_root: String,
}

impl HttpAdvisor {
    pub fn new(endpoint: impl Into<String>, workspace_root: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            workspace_root: workspace_root.into(),
        }
    }
}

#[async_trait]
impl SafetyAdvisor for HttpAdvisor {
    async fn advise(
        &self,
        request: &ConfirmationRequest,
        context: &str,
    ) -> Result<Decision, AdvisorError> {
        let kind = request.kind.to_string();
        let query = AdvisorQuery {
            kind: &kind,
            prompt: &request.prompt,
            details: &request.details,
            workspace_root: &self.workspace_root,
            context,
        };
        let response = self.client.post(&self.endpoint).json(&query).send().await?;
        if !response.status().is_success() {
            return Err(AdvisorError::Status(response.status().as_u16()));
        }
        let verdict: AdvisorVerdict = response
            .json()
            .await
            .map_err(|e| AdvisorError::Malformed(e.to_string()))?;
        verdict_to_decision(verdict)
    }
}

fn verdict_to_decision(verdict: AdvisorVerdict) -> Result<Decision, AdvisorError> {
    let mut decision =
        Decision::new(verdict.level, verdict.action, DecidedBy::Ai, verdict.reasoning);
    if let Some(suggestion) = verdict.suggested_modification {
        decision = decision.suggest(suggestion);
    }
    if decision.level == SafetyLevel::Unknown {
        return Err(AdvisorError::Malformed("advisor abstained with UNKNOWN".to_string()));
    }
    if !decision.respects_policy() {
        return Err(AdvisorError::Malformed(format!(
            "verdict violates policy: {} with action {}",
            decision.level, decision.action
        )));
    }
    Ok(decision)
}

#[cfg(test)]
#[path = "advisor_tests.rs"]
mod tests;
