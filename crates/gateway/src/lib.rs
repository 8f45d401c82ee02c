// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fm-gateway: REST snapshots and WebSocket fan-out.
//!
//! Strictly a reader: worker state comes from the status aggregator,
//! decision counters from the judge's log, and streams from the file
//! monitor's tailers. Slow clients lose frames (with a visible counter),
//! never data on disk.

pub mod rest;
pub mod server;
pub mod ws;

pub use server::{build_router, AppState};
