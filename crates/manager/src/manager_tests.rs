// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::escalation::DenyAll;
use crate::session::SessionResult;
use fm_core::{EntryType, ExecutionMode, TranscriptEntry, WorkerState};
use serde_json::Value;

fn test_config(root: &std::path::Path) -> Arc<SupervisorConfig> {
    Arc::new(SupervisorConfig {
        workspace_root: root.to_path_buf(),
        execution_mode: ExecutionMode::SubprocessInShell,
        poll_interval_ms: 50,
        ..SupervisorConfig::default()
    })
}

fn build_manager(config: Arc<SupervisorConfig>) -> WorkerManager {
    let engine = Arc::new(HybridEngine::new(&config, None));
    WorkerManager::new(config, engine, Arc::new(DenyAll), Arc::new(StatusAggregator::new()))
}

fn read_transcript(dirs: &WorkerDirs) -> Vec<TranscriptEntry> {
    std::fs::read_to_string(dirs.transcript_path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn read_metrics(dirs: &WorkerDirs) -> Vec<Value> {
    std::fs::read_to_string(dirs.metrics_path())
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[tokio::test]
async fn spawn_initialises_workspace_and_lifecycle() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let id = manager
        .spawn(SpawnSpec::new("wkr-1", "echo hello").task("say hello"))
        .unwrap();

    let dirs = manager.worker_dirs(&id).unwrap();
    assert!(dirs.transcript_path().exists());
    assert!(dirs.raw_log_path().exists());
    assert!(dirs.metrics_path().exists());
    assert_eq!(std::fs::read_to_string(dirs.task_path()).unwrap(), "say hello");

    let transcript = read_transcript(&dirs);
    assert_eq!(transcript[0].entry_type, EntryType::Lifecycle);
    assert_eq!(transcript[0].content, "spawned");

    let metrics = read_metrics(&dirs);
    assert_eq!(metrics[0]["type"].as_str(), Some("worker_lifecycle"));
    assert_eq!(metrics[0]["event"].as_str(), Some("spawned"));

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, WorkerState::Spawning);
    assert_eq!(status.task, "say hello");
}

#[tokio::test]
async fn duplicate_worker_id_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    manager.spawn(SpawnSpec::new("wkr-1", "echo a")).unwrap();
    let err = manager.spawn(SpawnSpec::new("wkr-1", "echo b")).unwrap_err();
    assert!(matches!(err, ManagerError::DuplicateWorker(_)));
}

#[tokio::test]
async fn max_workers_is_enforced() {
    let root = tempfile::tempdir().unwrap();
    let config = Arc::new(SupervisorConfig {
        workspace_root: root.path().to_path_buf(),
        execution_mode: ExecutionMode::SubprocessInShell,
        max_workers: 1,
        poll_interval_ms: 50,
        ..SupervisorConfig::default()
    });
    let manager = build_manager(config);

    manager.spawn(SpawnSpec::new("wkr-1", "sleep 30")).unwrap();
    let err = manager.spawn(SpawnSpec::new("wkr-2", "echo hi")).unwrap_err();
    assert!(matches!(err, ManagerError::MaxWorkers(1)));
}

#[tokio::test]
async fn clean_exit_completes_the_worker() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let id = manager.spawn(SpawnSpec::new("wkr-1", "echo all done")).unwrap();
    let result = manager.run_interactive_session(&id, 10).await.unwrap();
    assert_eq!(result, SessionResult::Completed);

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, WorkerState::Completed);
    assert_eq!(status.progress, 100);

    let dirs = manager.worker_dirs(&id).unwrap();
    let transcript = read_transcript(&dirs);
    assert_eq!(transcript.last().unwrap().content, "completed");
    let raw = std::fs::read_to_string(dirs.raw_log_path()).unwrap();
    assert!(raw.contains("all done"));
}

#[tokio::test]
async fn nonzero_exit_fails_the_worker() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let id = manager.spawn(SpawnSpec::new("wkr-1", "echo oops; exit 2")).unwrap();
    let result = manager.run_interactive_session(&id, 10).await.unwrap();
    assert_eq!(result, SessionResult::Failed { exit_code: Some(2) });

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, WorkerState::Failed);
    assert!(status.error_message.unwrap().contains("exit code 2"));
}

/// S1: a safe write is auto-approved by rules and the worker continues.
#[tokio::test]
async fn safe_write_prompt_is_auto_approved() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let script = r#"echo 'Write to file "src/main.py"? (y/n)'; read answer; echo "got:$answer""#;
    let id = manager.spawn(SpawnSpec::new("wkr-1", script)).unwrap();
    let result = manager.run_interactive_session(&id, 10).await.unwrap();
    assert_eq!(result, SessionResult::Completed);

    let dirs = manager.worker_dirs(&id).unwrap();
    let transcript = read_transcript(&dirs);

    let request = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationRequest)
        .expect("confirmation_request entry");
    assert_eq!(request.confirmation_type, Some(fm_core::ConfirmationKind::FileWrite));

    let response = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationResponse)
        .expect("confirmation_response entry");
    assert_eq!(response.content, "y");
    assert_eq!(response.seq, request.seq);

    let metrics = read_metrics(&dirs);
    let confirmation = metrics
        .iter()
        .find(|m| m["type"] == "confirmation")
        .expect("confirmation metric");
    assert_eq!(confirmation["decided_by"].as_str(), Some("rules"));
    assert_eq!(confirmation["response"].as_str(), Some("approved"));
    assert_eq!(confirmation["confirmation_number"].as_u64(), Some(1));

    // the reply reached the worker
    let raw = std::fs::read_to_string(dirs.raw_log_path()).unwrap();
    assert!(raw.contains("got:y"), "raw log: {raw}");
}

/// S2: a prohibited delete is denied (never escalated).
#[tokio::test]
async fn prohibited_delete_is_denied() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let script = r#"echo 'Delete file "/etc/passwd"? (y/n)'; read answer; echo "got:$answer""#;
    let id = manager.spawn(SpawnSpec::new("wkr-1", script)).unwrap();
    manager.run_interactive_session(&id, 10).await.unwrap();

    let dirs = manager.worker_dirs(&id).unwrap();
    let transcript = read_transcript(&dirs);
    let response = transcript
        .iter()
        .find(|e| e.entry_type == EntryType::ConfirmationResponse)
        .expect("confirmation_response entry");
    assert_eq!(response.content, "n");

    let metrics = read_metrics(&dirs);
    let confirmation =
        metrics.iter().find(|m| m["type"] == "confirmation").expect("confirmation metric");
    assert_eq!(confirmation["response"].as_str(), Some("denied"));
    assert_eq!(confirmation["decided_by"].as_str(), Some("rules"));

    let raw = std::fs::read_to_string(dirs.raw_log_path()).unwrap();
    assert!(raw.contains("got:n"), "raw log: {raw}");
}

/// P9: double terminate yields exactly one `terminated` lifecycle event.
#[tokio::test]
async fn terminate_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let manager = Arc::new(build_manager(test_config(root.path())));

    let id = manager.spawn(SpawnSpec::new("wkr-1", "sleep 60")).unwrap();
    let runner = {
        let manager = Arc::clone(&manager);
        let id = id.clone();
        tokio::spawn(async move { manager.run_interactive_session(&id, 10).await })
    };
    // let the session start before terminating
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    manager.terminate(&id, "operator request").await.unwrap();
    manager.terminate(&id, "operator request again").await.unwrap();

    let result = runner.await.unwrap().unwrap();
    assert_eq!(result, SessionResult::Terminated);

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, WorkerState::Terminated);

    let dirs = manager.worker_dirs(&id).unwrap();
    let terminated_events = read_transcript(&dirs)
        .iter()
        .filter(|e| e.entry_type == EntryType::Lifecycle && e.content.starts_with("terminated"))
        .count();
    assert_eq!(terminated_events, 1);
}

#[tokio::test]
async fn terminate_before_run_tears_down_directly() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let id = manager.spawn(SpawnSpec::new("wkr-1", "sleep 60")).unwrap();
    manager.terminate(&id, "never mind").await.unwrap();

    let status = manager.get_status(&id).unwrap();
    assert_eq!(status.state, WorkerState::Terminated);

    // the session can no longer be started
    let err = manager.run_interactive_session(&id, 10).await.unwrap_err();
    assert!(matches!(err, ManagerError::SessionUnavailable(_)));
}

#[tokio::test]
async fn terminate_unknown_worker_errors() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));
    let err = manager.terminate(&WorkerId::new("ghost"), "x").await.unwrap_err();
    assert!(matches!(err, ManagerError::UnknownWorker(_)));
}

#[tokio::test]
async fn list_workers_reflects_fleet() {
    let root = tempfile::tempdir().unwrap();
    let manager = build_manager(test_config(root.path()));

    let a = manager.spawn(SpawnSpec::new("wkr-a", "echo done")).unwrap();
    manager.spawn(SpawnSpec::new("wkr-b", "sleep 30")).unwrap();

    manager.run_interactive_session(&a, 10).await.unwrap();

    let all = manager.list_workers();
    assert_eq!(all.len(), 2);
    let summary = manager.status().get_summary(u64::MAX / 2);
    assert_eq!(summary.total_workers, 2);
    assert_eq!(summary.completed_workers, 1);
}

#[test]
fn generated_ids_are_unique_and_safe() {
    let a = SpawnSpec::with_generated_id("echo hi");
    let b = SpawnSpec::with_generated_id("echo hi");
    assert_ne!(a.worker_id, b.worker_id);
    assert!(a.worker_id.as_str().starts_with("wkr-"));
    fm_storage::validate_worker_id(&a.worker_id).unwrap();
}
