// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-pipeline specs: scripted workers through the PTY, judged by
//! rules, recorded in the transcript store.

use super::prelude::*;
use fm_core::EntryType;

#[tokio::test]
async fn transcript_totality_and_monotonicity() {
    let supervisor = Supervisor::new();

    // one safe write (approved) and one prohibited delete (denied)
    let script = concat!(
        r#"echo 'Write to file "src/main.py"? (y/n)'; read a; "#,
        r#"echo 'Delete file "/etc/passwd"? (y/n)'; read b; "#,
        r#"echo finishing"#,
    );
    let id = supervisor
        .manager
        .spawn(fm_manager::SpawnSpec::new("wkr-pipe", script).task("exercise the pipeline"))
        .expect("spawn");
    supervisor.manager.run_interactive_session(&id, 10).await.expect("session");

    let dirs = supervisor.dirs(&id);
    let transcript = read_transcript(&dirs);

    // Totality: every confirmation_request has a later response with the
    // same seq.
    let requests: Vec<_> = transcript
        .iter()
        .enumerate()
        .filter(|(_, e)| e.entry_type == EntryType::ConfirmationRequest)
        .collect();
    assert_eq!(requests.len(), 2);
    for (request_idx, request) in &requests {
        let answered = transcript
            .iter()
            .enumerate()
            .any(|(response_idx, response)| {
                response.entry_type == EntryType::ConfirmationResponse
                    && response.seq == request.seq
                    && response_idx > *request_idx
            });
        assert!(answered, "request seq {} has no later response", request.seq);
    }

    // Monotonicity: timestamps strictly increase over the whole file.
    let stamps: Vec<&String> = transcript.iter().map(|e| &e.timestamp).collect();
    for pair in stamps.windows(2) {
        assert!(pair[0] < pair[1], "timestamps must strictly increase: {pair:?}");
    }

    // The responses carry the expected answers.
    let responses: Vec<_> = transcript
        .iter()
        .filter(|e| e.entry_type == EntryType::ConfirmationResponse)
        .collect();
    assert_eq!(responses[0].content, "y");
    assert_eq!(responses[1].content, "n");
}

#[tokio::test]
async fn metric_lifecycle_is_coherent() {
    let supervisor = Supervisor::new();
    let id = supervisor
        .manager
        .spawn(fm_manager::SpawnSpec::new("wkr-life", "echo done"))
        .expect("spawn");
    supervisor.manager.run_interactive_session(&id, 10).await.expect("session");

    let metrics = read_metrics(&supervisor.dirs(&id));
    let lifecycle: Vec<&str> = metrics
        .iter()
        .filter(|m| m["type"] == "worker_lifecycle")
        .filter_map(|m| m["event"].as_str())
        .collect();

    assert_eq!(lifecycle.iter().filter(|e| **e == "spawned").count(), 1);
    let terminal = lifecycle
        .iter()
        .filter(|e| matches!(**e, "completed" | "failed" | "terminated"))
        .count();
    assert_eq!(terminal, 1, "exactly one terminal lifecycle event: {lifecycle:?}");
    assert_eq!(lifecycle.last(), Some(&"completed"));

    // terminal event carries a duration
    let completed = metrics
        .iter()
        .find(|m| m["event"] == "completed")
        .expect("completed event");
    assert!(completed["duration_seconds"].is_number());
}

#[tokio::test]
async fn caution_write_escalates_until_configured() {
    // unknown extension inside the workspace: CAUTION, default escalate,
    // deny-all handler answers n
    let script = r#"echo 'Write to file "blob.qz9"? (y/n)'; read a; echo "got:$a""#;

    let strict = Supervisor::new();
    let id = strict
        .manager
        .spawn(fm_manager::SpawnSpec::new("wkr-strict", script))
        .expect("spawn");
    strict.manager.run_interactive_session(&id, 10).await.expect("session");
    let responses: Vec<String> = read_transcript(&strict.dirs(&id))
        .iter()
        .filter(|e| e.entry_type == EntryType::ConfirmationResponse)
        .map(|e| e.content.clone())
        .collect();
    assert_eq!(responses, vec!["n"]);

    // with auto_approve_caution the same prompt is approved by rules
    let permissive = Supervisor::with_config(|c| c.auto_approve_caution = true);
    let id = permissive
        .manager
        .spawn(fm_manager::SpawnSpec::new("wkr-easy", script))
        .expect("spawn");
    permissive.manager.run_interactive_session(&id, 10).await.expect("session");
    let responses: Vec<String> = read_transcript(&permissive.dirs(&id))
        .iter()
        .filter(|e| e.entry_type == EntryType::ConfirmationResponse)
        .map(|e| e.content.clone())
        .collect();
    assert_eq!(responses, vec!["y"]);
}
