// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration.
//!
//! A single immutable record parsed once at startup. Components receive it
//! by reference (or a clone); nothing else reads the environment or the
//! config file. Validation failures are fatal.

use crate::confirmation::ConfirmationKind;
use crate::decision::DecisionAction;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating the configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How worker commands are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Split the command template on whitespace and exec directly
    #[default]
    Native,
    /// Run the command template through `sh -lc`
    SubprocessInShell,
}

/// Per-kind reply strings written to the worker's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyOverride {
    pub approve: String,
    pub deny: String,
}

impl Default for ReplyOverride {
    fn default() -> Self {
        Self { approve: "y".to_string(), deny: "n".to_string() }
    }
}

/// The complete supervisor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SupervisorConfig {
    /// Root directory holding per-worker workspaces; also the boundary for
    /// "inside/outside workspace" safety checks.
    pub workspace_root: PathBuf,
    /// 1..=64
    pub max_workers: u32,
    /// Hierarchy cap for hosts that nest workers
    pub max_depth: u32,
    pub execution_mode: ExecutionMode,
    pub auto_approve_safe: bool,
    pub auto_approve_caution: bool,
    /// When on, DANGEROUS requests matching `auto_approve_dangerous`
    /// are approved; everything else dangerous still escalates.
    pub unattended_mode: bool,
    /// Glob patterns, consulted only in unattended mode
    pub auto_approve_dangerous: Vec<String>,
    /// Allowlist of literal/glob command patterns considered safe to run
    pub safe_commands: Vec<String>,
    /// Denylist of command patterns that are always prohibited
    pub denylist_commands: Vec<String>,
    pub ai_advisor_timeout_ms: u64,
    pub escalation_timeout_s: u64,
    /// No output for this long fails the session with a timeout
    pub per_worker_idle_timeout_s: u64,
    /// Fallback poll cadence for PTY reads and file tailing, ≤ 500
    pub poll_interval_ms: u64,
    /// Historical entries replayed on stream connect, ≤ 1000
    pub history_emit_limit: usize,
    /// Per-connection WebSocket send queue depth
    pub ws_send_queue_depth: usize,
    pub raw_log_ansi_strip: bool,
    /// Reply string overrides keyed by confirmation kind
    pub reply_overrides: IndexMap<ConfirmationKind, ReplyOverride>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("./workspaces"),
            max_workers: 8,
            max_depth: 1,
            execution_mode: ExecutionMode::Native,
            auto_approve_safe: true,
            auto_approve_caution: false,
            unattended_mode: false,
            auto_approve_dangerous: Vec::new(),
            safe_commands: default_safe_commands(),
            denylist_commands: default_denylist(),
            ai_advisor_timeout_ms: 10_000,
            escalation_timeout_s: 300,
            per_worker_idle_timeout_s: 600,
            poll_interval_ms: 250,
            history_emit_limit: 100,
            ws_send_queue_depth: 256,
            raw_log_ansi_strip: true,
            reply_overrides: IndexMap::new(),
        }
    }
}

fn default_safe_commands() -> Vec<String> {
    [
        "ls", "ls *", "cat *", "head *", "tail *", "grep *", "find *", "pwd", "echo *",
        "git status", "git diff*", "git log*", "git show*", "git branch", "wc *", "which *",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_denylist() -> Vec<String> {
    [
        "rm -rf /",
        "rm -rf /*",
        "mkfs*",
        "shutdown*",
        "reboot*",
        "halt*",
        "dd if=* of=/dev/*",
        "sudo *",
        "su *",
        "chmod -R 777 /",
        ":(){*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl SupervisorConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check range constraints. Called by `load`; call directly for
    /// programmatically-built configs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workspace_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "workspace_root",
                reason: "must not be empty".to_string(),
            });
        }
        if !(1..=64).contains(&self.max_workers) {
            return Err(ConfigError::Invalid {
                field: "max_workers",
                reason: format!("{} outside 1..=64", self.max_workers),
            });
        }
        if self.poll_interval_ms == 0 || self.poll_interval_ms > 500 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: format!("{} outside 1..=500", self.poll_interval_ms),
            });
        }
        if self.history_emit_limit > 1000 {
            return Err(ConfigError::Invalid {
                field: "history_emit_limit",
                reason: format!("{} exceeds 1000", self.history_emit_limit),
            });
        }
        if self.ws_send_queue_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "ws_send_queue_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.escalation_timeout_s == 0 {
            return Err(ConfigError::Invalid {
                field: "escalation_timeout_s",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// The reply string written to a worker's stdin for `kind`/`action`.
    ///
    /// Defaults to `y` / `n`; per-kind overrides apply. Escalation has no
    /// reply of its own: the escalated answer maps back to approve/deny.
    pub fn reply_for(&self, kind: ConfirmationKind, action: DecisionAction) -> &str {
        let fallback = match action {
            DecisionAction::Approve => "y",
            DecisionAction::Deny | DecisionAction::Escalate => "n",
        };
        match self.reply_overrides.get(&kind) {
            Some(over) if action == DecisionAction::Approve => &over.approve,
            Some(over) => &over.deny,
            None => fallback,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
