// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon.
//!
//! Nothing outside this module reads the process environment; components
//! receive resolved values through the config record.

use crate::DaemonError;
use std::path::PathBuf;

/// Resolve state directory: FM_STATE_DIR > XDG_STATE_HOME/foreman >
/// ~/.local/state/foreman. Holds daemon logs.
pub fn state_dir() -> Result<PathBuf, DaemonError> {
    if let Ok(dir) = std::env::var("FM_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("foreman"));
    }
    let home = std::env::var("HOME").map_err(|_| DaemonError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/foreman"))
}

/// Supervisor config file (TOML). Absent means built-in defaults.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("FM_CONFIG").ok().map(PathBuf::from)
}

/// HTTP listen address for the gateway.
pub fn http_addr() -> String {
    std::env::var("FM_HTTP_ADDR").unwrap_or_else(|_| "127.0.0.1:8600".to_string())
}

/// AI advisor endpoint. Absent means rules + template only.
pub fn advisor_url() -> Option<String> {
    std::env::var("FM_ADVISOR_URL").ok().filter(|s| !s.is_empty())
}

/// Task intake file: TOML with `[[worker]]` tables. Absent means the
/// daemon starts with an empty fleet and only serves the API.
pub fn tasks_path() -> Option<PathBuf> {
    std::env::var("FM_TASKS").ok().map(PathBuf::from)
}

/// Log filter, e.g. `info` or `fm_manager=debug,info`.
pub fn log_filter() -> String {
    std::env::var("FM_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}

/// Confirmation budget per worker session.
pub fn max_iterations() -> u64 {
    std::env::var("FM_MAX_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000)
}
