// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker WebSocket streams.
//!
//! Every connection is an independent subscriber of the file monitor (or
//! the status aggregator). Frames are JSON text. Slow connections drop
//! their oldest frames; the running drop total is surfaced as `dropped`
//! on the next entry frame. One misbehaving connection never affects
//! another.

use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use fm_core::{Clock, WorkerId};
use fm_storage::{FileKind, StreamFrame, Subscription};
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Per-frame write budget; a stuck client is disconnected, not waited on.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);
/// Status snapshot cadence.
const STATUS_PUSH_EVERY: Duration = Duration::from_millis(500);

/// `GET /ws/dialogue/{worker_id}`
pub async fn dialogue_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| {
        stream_file(socket, state, WorkerId::new(worker_id), FileKind::Dialogue)
    })
}

/// `GET /ws/terminal/{worker_id}`
pub async fn terminal_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| {
        stream_file(socket, state, WorkerId::new(worker_id), FileKind::Terminal)
    })
}

/// `GET /ws/status/{worker_id}`
pub async fn status_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(worker_id): Path<String>,
) -> Response {
    ws.on_upgrade(move |socket| stream_status(socket, state, WorkerId::new(worker_id)))
}

/// Send one JSON frame within the write budget, retrying once.
async fn send_frame(
    sender: &mut (impl Sink<Message, Error = axum::Error> + Unpin),
    value: &Value,
) -> bool {
    let text = value.to_string();
    for _ in 0..2 {
        match tokio::time::timeout(WRITE_TIMEOUT, sender.send(Message::Text(text.clone()))).await
        {
            Ok(Ok(())) => return true,
            Ok(Err(_)) => return false,
            Err(_) => continue,
        }
    }
    false
}

async fn stream_file(socket: WebSocket, state: Arc<AppState>, worker_id: WorkerId, kind: FileKind) {
    let (mut sender, mut receiver) = socket.split();

    let known = state.status.get_status(&worker_id, state.clock.epoch_ms()).is_some();
    let Some(dirs) = state.worker_dirs(&worker_id).filter(|_| known) else {
        let _ = send_frame(
            &mut sender,
            &json!({ "type": "error", "message": "worker not found" }),
        )
        .await;
        let _ = sender.close().await;
        return;
    };

    let path = match kind {
        FileKind::Dialogue => dirs.transcript_path(),
        FileKind::Terminal => dirs.raw_log_path(),
    };
    let mut subscription: Subscription = state
        .monitor
        .subscribe_with_depth(&path, kind, state.config.ws_send_queue_depth)
        .await;

    let mut reported_dropped = 0u64;
    loop {
        tokio::select! {
            frame = subscription.recv() => {
                let Some(frame) = frame else {
                    // tailer unregistered (worker gone); clean close
                    break;
                };
                let value = match frame {
                    StreamFrame::Historical(data) => json!({ "type": "historical", "data": data }),
                    StreamFrame::Ready => json!({ "type": "ready" }),
                    StreamFrame::Live(data) => {
                        let dropped = subscription.dropped();
                        if dropped > reported_dropped {
                            reported_dropped = dropped;
                            json!({ "type": "entry", "data": data, "dropped": dropped })
                        } else {
                            json!({ "type": "entry", "data": data })
                        }
                    }
                };
                if !send_frame(&mut sender, &value).await {
                    tracing::debug!(%worker_id, "ws write failed, closing");
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {} // clients are dumb; ignore anything they say
                }
            }
        }
    }
    let _ = sender.close().await;
}

async fn stream_status(socket: WebSocket, state: Arc<AppState>, worker_id: WorkerId) {
    let (mut sender, mut receiver) = socket.split();

    let mut ticker = tokio::time::interval(STATUS_PUSH_EVERY);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let status = state.status.get_status(&worker_id, state.clock.epoch_ms());
                let terminal = status.as_ref().map(|s| s.state.is_terminal()).unwrap_or(true);
                let data = match &status {
                    Some(status) => serde_json::to_value(status).unwrap_or(Value::Null),
                    None => Value::Null,
                };
                let sent = send_frame(&mut sender, &json!({ "type": "status", "data": data })).await;
                if !sent || terminal {
                    // final snapshot delivered (or the worker is unknown)
                    break;
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }
    let _ = sender.close().await;
}

#[cfg(test)]
#[path = "ws_tests.rs"]
mod tests;
