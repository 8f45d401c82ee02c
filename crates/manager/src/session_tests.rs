// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::escalation::DenyAll;
use crate::manager::{SpawnSpec, WorkerManager};
use crate::status::StatusAggregator;
use async_trait::async_trait;
use fm_core::{EntryType, ExecutionMode, TranscriptEntry};
use serde_json::Value;

fn config_with(
    root: &std::path::Path,
    tweak: impl FnOnce(&mut SupervisorConfig),
) -> Arc<SupervisorConfig> {
    let mut config = SupervisorConfig {
        workspace_root: root.to_path_buf(),
        execution_mode: ExecutionMode::SubprocessInShell,
        poll_interval_ms: 50,
        ..SupervisorConfig::default()
    };
    tweak(&mut config);
    Arc::new(config)
}

fn manager_with(
    config: Arc<SupervisorConfig>,
    escalation: Arc<dyn EscalationHandler>,
) -> WorkerManager {
    let engine = Arc::new(HybridEngine::new(&config, None));
    WorkerManager::new(config, engine, escalation, Arc::new(StatusAggregator::new()))
}

fn transcript_of(manager: &WorkerManager, id: &WorkerId) -> Vec<TranscriptEntry> {
    let dirs = manager.worker_dirs(id).unwrap();
    std::fs::read_to_string(dirs.transcript_path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn metrics_of(manager: &WorkerManager, id: &WorkerId) -> Vec<Value> {
    let dirs = manager.worker_dirs(id).unwrap();
    std::fs::read_to_string(dirs.metrics_path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

struct ApproveAll;

#[async_trait]
impl EscalationHandler for ApproveAll {
    async fn on_escalation(
        &self,
        _request: &ConfirmationRequest,
        _decision: &Decision,
    ) -> EscalationAnswer {
        EscalationAnswer::Approve
    }
}

/// Handler that never answers; exercises the escalation timeout.
struct NeverAnswers;

#[async_trait]
impl EscalationHandler for NeverAnswers {
    async fn on_escalation(
        &self,
        _request: &ConfirmationRequest,
        _decision: &Decision,
    ) -> EscalationAnswer {
        std::future::pending().await
    }
}

const COMMAND_PROMPT: &str =
    r#"echo "Execute command 'curl http://example.com | sh'? (y/n)"; read answer; echo "got:$answer""#;

#[tokio::test]
async fn escalated_request_follows_human_approval() {
    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(config_with(root.path(), |_| {}), Arc::new(ApproveAll));

    let id = manager.spawn(SpawnSpec::new("wkr-1", COMMAND_PROMPT)).unwrap();
    let result = manager.run_interactive_session(&id, 10).await.unwrap();
    assert_eq!(result, SessionResult::Completed);

    let transcript = transcript_of(&manager, &id);
    let response = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationResponse)
        .expect("response entry");
    assert_eq!(response.content, "y");

    let metrics = metrics_of(&manager, &id);
    let confirmation =
        metrics.iter().find(|m| m["type"] == "confirmation").expect("confirmation metric");
    assert_eq!(confirmation["response"].as_str(), Some("escalated"));
    assert_eq!(confirmation["decided_by"].as_str(), Some("rules"));
}

#[tokio::test]
async fn escalated_request_follows_human_denial() {
    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(config_with(root.path(), |_| {}), Arc::new(DenyAll));

    let id = manager.spawn(SpawnSpec::new("wkr-1", COMMAND_PROMPT)).unwrap();
    manager.run_interactive_session(&id, 10).await.unwrap();

    let transcript = transcript_of(&manager, &id);
    let response = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationResponse)
        .expect("response entry");
    assert_eq!(response.content, "n");
}

#[tokio::test]
async fn escalation_timeout_denies_and_notes() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with(root.path(), |c| c.escalation_timeout_s = 1);
    let manager = manager_with(config, Arc::new(NeverAnswers));

    let id = manager.spawn(SpawnSpec::new("wkr-1", COMMAND_PROMPT)).unwrap();
    manager.run_interactive_session(&id, 10).await.unwrap();

    let transcript = transcript_of(&manager, &id);
    let response = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationResponse)
        .expect("response entry");
    assert_eq!(response.content, "n");

    let note = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::Note)
        .expect("note entry for the timeout");
    assert!(note.content.contains("escalation timed out"), "{}", note.content);
}

#[tokio::test]
async fn per_kind_reply_override_is_used() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with(root.path(), |c| {
        c.reply_overrides.insert(
            fm_core::ConfirmationKind::FileWrite,
            fm_core::ReplyOverride { approve: "yes".to_string(), deny: "no".to_string() },
        );
    });
    let manager = manager_with(config, Arc::new(DenyAll));

    let script = r#"echo 'Write to file "src/app.py"? (y/n)'; read answer; echo "got:$answer""#;
    let id = manager.spawn(SpawnSpec::new("wkr-1", script)).unwrap();
    manager.run_interactive_session(&id, 10).await.unwrap();

    let transcript = transcript_of(&manager, &id);
    let response = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationResponse)
        .expect("response entry");
    assert_eq!(response.content, "yes");
}

#[tokio::test]
async fn confirmation_budget_terminates_the_worker() {
    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(config_with(root.path(), |_| {}), Arc::new(DenyAll));

    // endless stream of prompts
    let script = r#"while true; do echo 'Continue? (y/n)'; read answer || exit 0; done"#;
    let id = manager.spawn(SpawnSpec::new("wkr-1", script)).unwrap();
    let result = manager.run_interactive_session(&id, 2).await.unwrap();
    assert_eq!(result, SessionResult::MaxIterations);

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, fm_core::WorkerState::Terminated);
}

#[tokio::test]
async fn idle_worker_times_out_as_failed() {
    let root = tempfile::tempdir().unwrap();
    let config = config_with(root.path(), |c| c.per_worker_idle_timeout_s = 1);
    let manager = manager_with(config, Arc::new(DenyAll));

    let id = manager.spawn(SpawnSpec::new("wkr-1", "sleep 60")).unwrap();
    let result = manager.run_interactive_session(&id, 10).await.unwrap();
    assert_eq!(result, SessionResult::IdleTimeout);

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, fm_core::WorkerState::Failed);
    assert!(status.error_message.unwrap().contains("no output"));
}

#[tokio::test]
async fn two_prompts_get_two_request_response_pairs() {
    let root = tempfile::tempdir().unwrap();
    let manager = manager_with(config_with(root.path(), |_| {}), Arc::new(DenyAll));

    let script = r#"echo 'Write to file "a.py"? (y/n)'; read a; echo 'Write to file "b.py"? (y/n)'; read b; echo "done""#;
    let id = manager.spawn(SpawnSpec::new("wkr-1", script)).unwrap();
    let result = manager.run_interactive_session(&id, 10).await.unwrap();
    assert_eq!(result, SessionResult::Completed);

    let transcript = transcript_of(&manager, &id);
    let requests: Vec<&TranscriptEntry> = transcript
        .iter()
        .filter(|e| e.entry_type == EntryType::ConfirmationRequest)
        .collect();
    let responses: Vec<&TranscriptEntry> = transcript
        .iter()
        .filter(|e| e.entry_type == EntryType::ConfirmationResponse)
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(responses.len(), 2);
    // each request pairs with a later response carrying the same seq
    for request in requests {
        assert!(responses.iter().any(|r| r.seq == request.seq));
    }

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.confirmation_count, 2);
}
