// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File monitor: converts append-only files into live streams of parsed
//! entries.
//!
//! One tailer task per watched file. OS change notifications are bridged
//! from the watcher thread over a bounded channel (the watcher never calls
//! async code directly); a fallback poll tick covers filesystems where
//! notification is unreliable. Each subscriber owns an independent bounded
//! queue with drop-oldest overflow, so a slow consumer can never stall the
//! tailer or its peers.

use crate::tail::TailReader;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// How lines of a watched file are parsed before publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// JSONL dialogue transcript; each line must parse as a JSON object
    Dialogue,
    /// Plain text terminal log; each line is published as a JSON string
    Terminal,
}

/// One frame delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    /// Replayed entry from before the subscription
    Historical(Value),
    /// End of historical replay
    Ready,
    /// Entry appended after the subscription
    Live(Value),
}

struct SubscriberQueue {
    frames: Mutex<VecDeque<StreamFrame>>,
    capacity: usize,
    dropped: AtomicU64,
    notify: Notify,
    /// Set when the subscription handle is dropped
    closed: AtomicBool,
    /// Set when the tailer stops; recv returns None once drained
    finished: AtomicBool,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::new()),
            capacity,
            dropped: AtomicU64::new(0),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    fn push(&self, frame: StreamFrame) {
        {
            let mut frames = self.frames.lock();
            if frames.len() >= self.capacity {
                frames.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            frames.push_back(frame);
        }
        self.notify.notify_one();
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

/// A live subscription to one watched file.
pub struct Subscription {
    queue: Arc<SubscriberQueue>,
}

impl Subscription {
    /// Receive the next frame; `None` once the tailer has stopped and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<StreamFrame> {
        loop {
            if let Some(frame) = self.queue.frames.lock().pop_front() {
                return Some(frame);
            }
            if self.queue.finished.load(Ordering::Acquire) {
                return None;
            }
            self.queue.notify.notified().await;
        }
    }

    /// Try to receive without waiting.
    pub fn try_recv(&mut self) -> Option<StreamFrame> {
        self.queue.frames.lock().pop_front()
    }

    /// Total frames dropped from this subscriber's queue so far.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.queue.closed.store(true, Ordering::Release);
    }
}

enum Control {
    Subscribe { queue: Arc<SubscriberQueue> },
    Stop,
}

/// Monitors append-only files and fans their lines out to subscribers.
pub struct FileMonitor {
    poll_interval: Duration,
    history_limit: usize,
    queue_depth: usize,
    tailers: Mutex<HashMap<PathBuf, mpsc::Sender<Control>>>,
}

impl FileMonitor {
    pub fn new(poll_interval_ms: u64, history_limit: usize, queue_depth: usize) -> Self {
        Self {
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            history_limit,
            queue_depth,
            tailers: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe to a file, receiving up to `history_emit_limit` historical
    /// entries, a `Ready` marker, then live entries.
    pub async fn subscribe(&self, path: &Path, kind: FileKind) -> Subscription {
        self.subscribe_with_depth(path, kind, self.queue_depth).await
    }

    /// Subscribe with a caller-chosen queue depth (e.g. the WebSocket send
    /// queue depth for gateway connections).
    pub async fn subscribe_with_depth(
        &self,
        path: &Path,
        kind: FileKind,
        depth: usize,
    ) -> Subscription {
        let queue = Arc::new(SubscriberQueue::new(depth.max(1)));
        let ctrl_tx = self.tailer_for(path, kind);
        if ctrl_tx.send(Control::Subscribe { queue: Arc::clone(&queue) }).await.is_err() {
            // Tailer died between lookup and send; retry once with a fresh one
            self.tailers.lock().remove(path);
            let ctrl_tx = self.tailer_for(path, kind);
            if ctrl_tx.send(Control::Subscribe { queue: Arc::clone(&queue) }).await.is_err() {
                queue.finish();
            }
        }
        Subscription { queue }
    }

    /// Stop watching a file. Existing subscribers drain and then see
    /// end-of-stream. Called when a worker reaches a terminal state.
    pub async fn unwatch(&self, path: &Path) {
        let ctrl_tx = self.tailers.lock().remove(path);
        if let Some(ctrl_tx) = ctrl_tx {
            let _ = ctrl_tx.send(Control::Stop).await;
        }
    }

    fn tailer_for(&self, path: &Path, kind: FileKind) -> mpsc::Sender<Control> {
        let mut tailers = self.tailers.lock();
        if let Some(ctrl_tx) = tailers.get(path) {
            return ctrl_tx.clone();
        }
        let (ctrl_tx, ctrl_rx) = mpsc::channel(16);
        let tailer = Tailer {
            path: path.to_path_buf(),
            kind,
            reader: TailReader::from_start(path),
            subscribers: Vec::new(),
            history_limit: self.history_limit,
            poll_interval: self.poll_interval,
        };
        tokio::spawn(tailer.run(ctrl_rx));
        tailers.insert(path.to_path_buf(), ctrl_tx.clone());
        ctrl_tx
    }
}

struct Tailer {
    path: PathBuf,
    kind: FileKind,
    reader: TailReader,
    subscribers: Vec<Arc<SubscriberQueue>>,
    history_limit: usize,
    poll_interval: Duration,
}

impl Tailer {
    async fn run(mut self, mut ctrl_rx: mpsc::Receiver<Control>) {
        // Bridge from the notify watcher thread onto this task
        let (event_tx, mut event_rx) = mpsc::channel::<()>(32);
        let mut watcher = register_watcher(&self.path, event_tx.clone());

        // Content present before the first subscriber is history, not live
        self.catch_up_quietly();

        loop {
            tokio::select! {
                ctrl = ctrl_rx.recv() => match ctrl {
                    Some(Control::Subscribe { queue }) => self.attach(queue),
                    Some(Control::Stop) | None => break,
                },
                Some(()) = event_rx.recv() => self.drain(),
                _ = tokio::time::sleep(self.poll_interval) => {
                    if watcher.is_none() {
                        watcher = register_watcher(&self.path, event_tx.clone());
                    }
                    self.drain();
                }
            }
        }

        self.drain();
        for sub in &self.subscribers {
            sub.finish();
        }
    }

    /// Advance the offset over pre-existing content without publishing;
    /// that content is served as history to each subscriber.
    fn catch_up_quietly(&mut self) {
        if let Err(e) = self.reader.read_new_lines() {
            tracing::warn!(path = %self.path.display(), error = %e, "initial catch-up failed");
        }
    }

    fn attach(&mut self, queue: Arc<SubscriberQueue>) {
        // Publish any pending lines first so history and live don't overlap
        self.drain();
        for value in self.read_history() {
            queue.push(StreamFrame::Historical(value));
        }
        queue.push(StreamFrame::Ready);
        self.subscribers.push(queue);
    }

    /// Last `history_limit` parsed entries before the current offset.
    ///
    /// Bounded by the live offset so history and live never overlap.
    fn read_history(&self) -> VecDeque<Value> {
        use std::io::BufRead;

        let mut history = VecDeque::new();
        let Ok(file) = std::fs::File::open(&self.path) else {
            return history;
        };
        let mut reader = std::io::BufReader::new(file);
        let end = self.reader.offset();
        let mut pos = 0u64;
        let mut buf = String::new();
        while pos < end {
            buf.clear();
            match reader.read_line(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    pos += n as u64;
                    if pos > end {
                        break;
                    }
                    let line = buf.trim_end_matches(['\n', '\r']);
                    if line.is_empty() {
                        continue;
                    }
                    if let Some(value) = parse_line(self.kind, line) {
                        if history.len() >= self.history_limit {
                            history.pop_front();
                        }
                        history.push_back(value);
                    }
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "history read failed");
                    break;
                }
            }
        }
        history
    }

    fn drain(&mut self) {
        let lines = match self.reader.read_new_lines() {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "tail read failed");
                return;
            }
        };
        if lines.is_empty() {
            return;
        }
        self.subscribers.retain(|sub| !sub.closed.load(Ordering::Acquire));
        for line in lines {
            let Some(value) = parse_line(self.kind, &line) else { continue };
            for sub in &self.subscribers {
                sub.push(StreamFrame::Live(value.clone()));
            }
        }
    }
}

fn parse_line(kind: FileKind, line: &str) -> Option<Value> {
    match kind {
        FileKind::Dialogue => match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_object() => Some(value),
            Ok(_) => {
                tracing::warn!("skipping non-object transcript line");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed transcript line");
                None
            }
        },
        FileKind::Terminal => Some(Value::String(line.to_string())),
    }
}

fn register_watcher(path: &Path, event_tx: mpsc::Sender<()>) -> Option<RecommendedWatcher> {
    if !path.exists() {
        return None;
    }
    let mut watcher = match notify::recommended_watcher(move |res: Result<notify::Event, _>| {
        if res.is_ok() {
            let _ = event_tx.blocking_send(());
        }
    }) {
        Ok(w) => w,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "file watcher failed, polling only");
            return None;
        }
    };
    match watcher.watch(path, RecursiveMode::NonRecursive) {
        Ok(()) => Some(watcher),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "file watch failed, polling only");
            None
        }
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
