// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    spawning = { WorkerState::Spawning, "spawning" },
    running = { WorkerState::Running, "running" },
    waiting = { WorkerState::WaitingConfirmation, "waiting_confirmation" },
    completed = { WorkerState::Completed, "completed" },
    failed = { WorkerState::Failed, "failed" },
    terminated = { WorkerState::Terminated, "terminated" },
)]
fn state_serializes_to_snake_case(state: WorkerState, expected: &str) {
    let json = serde_json::to_string(&state).unwrap();
    assert_eq!(json, format!("\"{}\"", expected));
    assert_eq!(state.to_string(), expected);
}

#[yare::parameterized(
    spawn_to_run = { WorkerState::Spawning, WorkerState::Running },
    run_to_waiting = { WorkerState::Running, WorkerState::WaitingConfirmation },
    waiting_to_run = { WorkerState::WaitingConfirmation, WorkerState::Running },
    run_to_completed = { WorkerState::Running, WorkerState::Completed },
    run_to_failed = { WorkerState::Running, WorkerState::Failed },
    spawn_to_failed = { WorkerState::Spawning, WorkerState::Failed },
    waiting_to_terminated = { WorkerState::WaitingConfirmation, WorkerState::Terminated },
    spawn_to_terminated = { WorkerState::Spawning, WorkerState::Terminated },
)]
fn allowed_transitions(from: WorkerState, to: WorkerState) {
    assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
}

#[yare::parameterized(
    spawn_to_waiting = { WorkerState::Spawning, WorkerState::WaitingConfirmation },
    spawn_to_completed = { WorkerState::Spawning, WorkerState::Completed },
    waiting_to_completed = { WorkerState::WaitingConfirmation, WorkerState::Completed },
    completed_to_running = { WorkerState::Completed, WorkerState::Running },
    failed_to_running = { WorkerState::Failed, WorkerState::Running },
    terminated_to_terminated = { WorkerState::Terminated, WorkerState::Terminated },
    completed_to_terminated = { WorkerState::Completed, WorkerState::Terminated },
)]
fn rejected_transitions(from: WorkerState, to: WorkerState) {
    assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
}

#[test]
fn terminal_states() {
    assert!(WorkerState::Completed.is_terminal());
    assert!(WorkerState::Failed.is_terminal());
    assert!(WorkerState::Terminated.is_terminal());
    assert!(!WorkerState::Spawning.is_terminal());
    assert!(!WorkerState::Running.is_terminal());
    assert!(!WorkerState::WaitingConfirmation.is_terminal());
}

#[test]
fn worker_id_borrows_as_str() {
    let id = WorkerId::new("wkr-1");
    assert_eq!(id, "wkr-1");
    assert_eq!(id.as_str(), "wkr-1");
    assert_eq!(id.to_string(), "wkr-1");
}

#[test]
fn elapsed_freezes_at_completion() {
    let rec = WorkerRecord::builder()
        .start_time_ms(10_000_u64)
        .completed_time_ms(70_000_u64)
        .build();
    // now is well past completion, elapsed stays at completion
    assert_eq!(rec.elapsed_secs(500_000), 60);
}

#[test]
fn elapsed_tracks_now_while_running() {
    let rec = WorkerRecord::builder().start_time_ms(10_000_u64).build();
    assert_eq!(rec.elapsed_secs(25_000), 15);
}

#[test]
fn record_roundtrips_through_json() {
    let rec = WorkerRecord::builder()
        .worker_id("wkr-7")
        .task("port the scheduler")
        .output_lines(42_u64)
        .error_message("boom")
        .build();
    let json = serde_json::to_string(&rec).unwrap();
    let parsed: WorkerRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(rec, parsed);
}
