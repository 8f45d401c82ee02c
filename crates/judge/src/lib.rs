// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-judge: the layered safety policy.
//!
//! Three classifiers, cheapest first:
//! 1. [`RuleEngine`] — deterministic, sub-millisecond, authoritative when
//!    it returns a non-UNKNOWN level;
//! 2. [`SafetyAdvisor`] — an external AI classifier consulted only when
//!    rules abstain, bounded by a timeout;
//! 3. [`TemplateResponder`] — hard-coded conservative defaults per kind.
//!
//! [`HybridEngine`] routes every request down this chain and keeps the
//! aggregate counters served by the metrics API.

pub mod advisor;
pub mod engine;
pub mod rules;
pub mod template;

pub use advisor::{AdvisorError, HttpAdvisor, SafetyAdvisor};
pub use engine::{DecisionLog, HybridEngine, MetricsSnapshot, RecentDecision};
pub use rules::RuleEngine;
pub use template::TemplateResponder;
