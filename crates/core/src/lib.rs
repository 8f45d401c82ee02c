// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-core: shared data model for the foreman supervisor.
//!
//! Every wire shape the supervisor persists or serves lives here: worker
//! identity and lifecycle, confirmation requests, safety decisions, the
//! dialogue transcript line, metric events, and the supervisor config.

pub mod macros;

pub mod config;
pub mod confirmation;
pub mod decision;
pub mod metrics;
pub mod time;
pub mod transcript;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{ConfigError, ExecutionMode, ReplyOverride, SupervisorConfig};
pub use confirmation::{ConfirmationKind, ConfirmationRequest};
pub use decision::{ConfirmationOutcome, DecidedBy, Decision, DecisionAction, SafetyLevel};
pub use metrics::{LifecycleEvent, MetricEvent};
pub use time::{iso_millis, Clock, FakeClock, SystemClock};
pub use transcript::{Direction, EntryType, TranscriptEntry};
pub use worker::{WorkerId, WorkerRecord, WorkerState};
