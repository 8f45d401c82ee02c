// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::advisor::AdvisorError;
use async_trait::async_trait;
use fm_core::test_support::sample_request;

struct StubAdvisor {
    verdict: Option<Decision>,
}

#[async_trait]
impl SafetyAdvisor for StubAdvisor {
    async fn advise(
        &self,
        _request: &ConfirmationRequest,
        _context: &str,
    ) -> Result<Decision, AdvisorError> {
        match &self.verdict {
            Some(decision) => Ok(decision.clone()),
            None => Err(AdvisorError::Malformed("stub failure".to_string())),
        }
    }
}

/// Advisor that never answers; exercises the timeout path.
struct HungAdvisor;

#[async_trait]
impl SafetyAdvisor for HungAdvisor {
    async fn advise(
        &self,
        _request: &ConfirmationRequest,
        _context: &str,
    ) -> Result<Decision, AdvisorError> {
        std::future::pending().await
    }
}

fn config() -> SupervisorConfig {
    SupervisorConfig { workspace_root: "/ws".into(), ..SupervisorConfig::default() }
}

fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        workspace_root: "/ws".into(),
        ai_advisor_timeout_ms: 50,
        ..SupervisorConfig::default()
    }
}

#[tokio::test]
async fn rules_answer_without_consulting_advisor() {
    // An advisor that would approve everything must not be asked when the
    // rules already have a verdict.
    let advisor = Arc::new(StubAdvisor {
        verdict: Some(Decision::new(
            SafetyLevel::Safe,
            DecisionAction::Approve,
            DecidedBy::Ai,
            "would approve",
        )),
    });
    let engine = HybridEngine::new(&config(), Some(advisor));

    let request = sample_request(ConfirmationKind::FileDelete);
    let decision = engine.decide(&request, "").await;
    assert_eq!(decision.decided_by, DecidedBy::Rules);
    assert_eq!(decision.level, SafetyLevel::Dangerous);
    assert_eq!(decision.action, DecisionAction::Escalate);
}

#[tokio::test]
async fn advisor_answers_when_rules_abstain() {
    let advisor = Arc::new(StubAdvisor {
        verdict: Some(Decision::new(
            SafetyLevel::Safe,
            DecisionAction::Approve,
            DecidedBy::Ai,
            "scaffolding is harmless",
        )),
    });
    let engine = HybridEngine::new(&config(), Some(advisor));

    let request = sample_request(ConfirmationKind::Unknown);
    let decision = engine.decide(&request, "recent output").await;
    assert_eq!(decision.decided_by, DecidedBy::Ai);
    assert_eq!(decision.action, DecisionAction::Approve);
}

#[tokio::test]
async fn advisor_failure_falls_through_to_template() {
    let advisor = Arc::new(StubAdvisor { verdict: None });
    let engine = HybridEngine::new(&config(), Some(advisor));

    let request = sample_request(ConfirmationKind::GenericYesNo);
    let decision = engine.decide(&request, "").await;
    assert_eq!(decision.decided_by, DecidedBy::Template);
    assert_eq!(decision.action, DecisionAction::Escalate);
}

#[tokio::test]
async fn advisor_timeout_falls_through_to_template() {
    let engine = HybridEngine::new(&fast_config(), Some(Arc::new(HungAdvisor)));

    let request = sample_request(ConfirmationKind::GenericYesNo);
    let decision = engine.decide(&request, "").await;
    assert_eq!(decision.decided_by, DecidedBy::Template);
    assert_eq!(decision.action, DecisionAction::Escalate);
}

#[tokio::test]
async fn no_advisor_goes_straight_to_template() {
    let engine = HybridEngine::new(&config(), None);

    let request = sample_request(ConfirmationKind::Unknown);
    let decision = engine.decide(&request, "").await;
    assert_eq!(decision.decided_by, DecidedBy::Template);
}

#[tokio::test]
async fn counters_track_each_layer() {
    let engine = HybridEngine::new(&fast_config(), Some(Arc::new(HungAdvisor)));

    engine.decide(&sample_request(ConfirmationKind::FileWrite), "").await; // rules
    engine.decide(&sample_request(ConfirmationKind::FileDelete), "").await; // rules
    engine.decide(&sample_request(ConfirmationKind::GenericYesNo), "").await; // template

    let metrics = engine.log().metrics();
    assert_eq!(metrics.total_decisions, 3);
    assert_eq!(metrics.rules_decisions, 2);
    assert_eq!(metrics.ai_decisions, 0);
    assert_eq!(metrics.template_fallbacks, 1);
    assert!((metrics.rules_percentage - 66.666).abs() < 0.1);
}

#[tokio::test]
async fn empty_log_reports_zeroes() {
    let engine = HybridEngine::new(&config(), None);
    let metrics = engine.log().metrics();
    assert_eq!(metrics.total_decisions, 0);
    assert_eq!(metrics.average_latency_ms, 0.0);
    assert_eq!(metrics.rules_percentage, 0.0);
}

#[tokio::test]
async fn recent_returns_newest_first_and_caps_limit() {
    let engine = HybridEngine::new(&config(), None);

    for _ in 0..5 {
        engine.decide(&sample_request(ConfirmationKind::FileWrite), "").await;
    }
    engine.decide(&sample_request(ConfirmationKind::FileDelete), "").await;

    let recent = engine.log().recent(3);
    assert_eq!(recent.len(), 3);
    assert_eq!(recent[0].confirmation_type, ConfirmationKind::FileDelete);
    assert_eq!(recent[0].decided_by, DecidedBy::Rules);
    assert!(!recent[0].is_fallback);
}

#[tokio::test]
async fn template_decisions_are_flagged_as_fallback() {
    let engine = HybridEngine::new(&config(), None);
    engine.decide(&sample_request(ConfirmationKind::Unknown), "").await;

    let recent = engine.log().recent(10);
    assert_eq!(recent.len(), 1);
    assert!(recent[0].is_fallback);
}
