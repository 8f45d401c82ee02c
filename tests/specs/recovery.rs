// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash/recovery specs: a restarted supervisor replays the pre-crash
//! transcript verbatim and never surfaces partial JSON.

use super::prelude::*;
use fm_storage::{FileKind, FileMonitor, StreamFrame};
use std::io::Write as _;
use std::time::Duration;

async fn recv(subscription: &mut fm_storage::Subscription) -> Option<StreamFrame> {
    tokio::time::timeout(Duration::from_secs(5), subscription.recv()).await.ok().flatten()
}

#[tokio::test]
async fn restart_replays_last_hundred_entries_verbatim() {
    let root = tempfile::tempdir().expect("tempdir");
    let path = root.path().join("dialogue_transcript.jsonl");

    // pre-crash transcript: 120 entries, then a torn final line
    {
        let mut file = std::fs::File::create(&path).expect("create");
        for seq in 1..=120 {
            writeln!(
                file,
                r#"{{"timestamp":"2026-08-01T12:00:{:02}.{:03}Z","worker_id":"wkr-1","direction":"worker→supervisor","type":"output","content":"line {seq}","seq":{seq}}}"#,
                seq / 1000,
                seq % 1000,
            )
            .expect("write");
        }
        write!(file, r#"{{"timestamp":"2026-08-01T12:59:59.999Z","worker_id":"wkr-1","#)
            .expect("partial write");
    }

    // "restart": a brand-new monitor with no carried state
    let monitor = FileMonitor::new(20, 100, 1024);
    let mut subscription = monitor.subscribe(&path, FileKind::Dialogue).await;

    let mut historical = Vec::new();
    loop {
        match recv(&mut subscription).await {
            Some(StreamFrame::Historical(value)) => historical.push(value),
            Some(StreamFrame::Ready) => break,
            other => panic!("unexpected frame before ready: {other:?}"),
        }
    }

    assert_eq!(historical.len(), 100, "history is capped at the limit");
    let seqs: Vec<u64> = historical.iter().map(|v| v["seq"].as_u64().expect("seq")).collect();
    let expected: Vec<u64> = (21..=120).collect();
    assert_eq!(seqs, expected, "the LAST 100 pre-crash entries, in order");
    assert_eq!(historical[0]["content"].as_str(), Some("line 21"));

    // the torn line must not have surfaced
    assert!(historical.iter().all(|v| v["type"].is_string()));

    // once the torn line completes, it is delivered whole as a live entry
    {
        let mut file =
            std::fs::OpenOptions::new().append(true).open(&path).expect("reopen");
        writeln!(
            file,
            r#""direction":"worker→supervisor","type":"output","content":"recovered","seq":121}}"#
        )
        .expect("complete the line");
    }
    let Some(StreamFrame::Live(value)) = recv(&mut subscription).await else {
        panic!("expected the completed line as a live frame");
    };
    assert_eq!(value["seq"].as_u64(), Some(121));
    assert_eq!(value["content"].as_str(), Some("recovered"));
}

#[tokio::test]
async fn transcript_files_survive_manager_restart() {
    // two manager generations over the same workspace root
    let root = tempfile::tempdir().expect("tempdir");

    let first = Supervisor::with_root(root.path());
    let id = first
        .manager
        .spawn(fm_manager::SpawnSpec::new("wkr-gen", "echo generation one"))
        .expect("spawn");
    first.manager.run_interactive_session(&id, 10).await.expect("session");
    drop(first);

    // the second generation reuses nothing in memory; only the files remain
    let path = root.path().join("wkr-gen/dialogue_transcript.jsonl");
    let transcript = read_transcript_at(&path);
    assert!(!transcript.is_empty());
    assert_eq!(transcript.last().expect("last").content, "completed");

    let monitor = FileMonitor::new(20, 100, 1024);
    let mut subscription = monitor.subscribe(&path, FileKind::Dialogue).await;
    let mut replayed = 0;
    loop {
        match recv(&mut subscription).await {
            Some(StreamFrame::Historical(_)) => replayed += 1,
            Some(StreamFrame::Ready) => break,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert_eq!(replayed, transcript.len());
}
