// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming fidelity specs: the on-disk record stays complete while
//! slow subscribers lose frames, and entries round-trip through the
//! monitor unchanged.

use super::prelude::*;
use fm_core::WorkerId;
use fm_storage::{FileKind, FileMonitor, StreamFrame, TranscriptWriter, WorkerDirs};
use std::time::Duration;

/// P8: an entry written to the transcript and read back through the file
/// monitor is equal in all required fields.
#[tokio::test]
async fn round_trip_through_the_monitor() {
    let root = tempfile::tempdir().expect("tempdir");
    let id = WorkerId::new("wkr-rt");
    let dirs = WorkerDirs::new(root.path(), &id).expect("dirs");
    dirs.init(None).expect("init");

    let monitor = FileMonitor::new(20, 100, 1024);
    let mut subscription = monitor.subscribe(&dirs.transcript_path(), FileKind::Dialogue).await;
    assert_eq!(recv(&mut subscription).await, Some(StreamFrame::Ready));

    let mut writer = TranscriptWriter::open(&dirs, id.clone()).expect("writer");
    let written = writer
        .confirmation_request(
            5_000,
            fm_core::ConfirmationKind::FileWrite,
            "Write to file \"src/main.py\"? (y/n)",
            "Write to file \"src/main.py\"?",
        )
        .expect("write");

    let Some(StreamFrame::Live(value)) = recv(&mut subscription).await else {
        panic!("expected a live frame");
    };
    let restored: fm_core::TranscriptEntry =
        serde_json::from_value(value).expect("entry parses");
    assert_eq!(restored, written);
}

/// S5 (storage half): a slow consumer sees a bounded, in-order suffix
/// with a drop counter, while the file keeps every line.
#[tokio::test]
async fn slow_consumer_loses_frames_but_disk_keeps_all() {
    let root = tempfile::tempdir().expect("tempdir");
    let id = WorkerId::new("wkr-slow");
    let dirs = WorkerDirs::new(root.path(), &id).expect("dirs");
    dirs.init(None).expect("init");

    let queue_depth = 16;
    let monitor = FileMonitor::new(20, 100, queue_depth);
    let mut subscription = monitor.subscribe(&dirs.transcript_path(), FileKind::Dialogue).await;
    assert_eq!(recv(&mut subscription).await, Some(StreamFrame::Ready));

    let mut writer = TranscriptWriter::open(&dirs, id).expect("writer");
    let total = 100u64;
    for i in 0..total {
        writer.output(1_000 + i, &format!("line {i}")).expect("write");
    }
    // consumer sleeps while the writer races ahead
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut seen = Vec::new();
    while let Some(frame) = subscription.try_recv() {
        if let StreamFrame::Live(value) = frame {
            seen.push(value["seq"].as_u64().expect("seq"));
        }
    }

    assert!(subscription.dropped() > 0, "a slow consumer must drop frames");
    assert!(seen.len() <= queue_depth);
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "survivors stay in order: {seen:?}");
    assert_eq!(seen.last(), Some(&total), "the newest entry survives");

    // the on-disk record is complete
    let on_disk = read_transcript_at(&dirs.transcript_path());
    assert_eq!(on_disk.len(), total as usize);
}

async fn recv(subscription: &mut fm_storage::Subscription) -> Option<StreamFrame> {
    tokio::time::timeout(Duration::from_secs(5), subscription.recv()).await.ok().flatten()
}
