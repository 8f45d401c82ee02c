// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confirmation requests parsed from worker terminal output.
//!
//! A confirmation request is an in-band y/n-style prompt from the worker
//! that requires an authoritative answer before the worker will proceed.

use crate::WorkerId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Category of a confirmation request.
///
/// Closed enumeration; prompt recognition maps every prompt onto exactly
/// one of these, falling back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationKind {
    FileWrite,
    FileDelete,
    CommandExecute,
    PackageInstall,
    GenericYesNo,
    Unknown,
}

crate::simple_display! {
    ConfirmationKind {
        FileWrite => "file_write",
        FileDelete => "file_delete",
        CommandExecute => "command_execute",
        PackageInstall => "package_install",
        GenericYesNo => "generic_yes_no",
        Unknown => "unknown",
    }
}

impl ConfirmationKind {
    /// All kinds, most specific first.
    ///
    /// When more than one kind could match the same prompt, the more
    /// specific one wins: file_delete > file_write > command_execute >
    /// package_install > generic_yes_no > unknown.
    pub const BY_SPECIFICITY: [ConfirmationKind; 6] = [
        ConfirmationKind::FileDelete,
        ConfirmationKind::FileWrite,
        ConfirmationKind::CommandExecute,
        ConfirmationKind::PackageInstall,
        ConfirmationKind::GenericYesNo,
        ConfirmationKind::Unknown,
    ];

    /// Lower rank is more specific.
    pub fn specificity_rank(&self) -> usize {
        Self::BY_SPECIFICITY.iter().position(|k| k == self).unwrap_or(usize::MAX)
    }

    /// The detail-map key this kind is required to extract, if any.
    pub fn required_detail(&self) -> Option<&'static str> {
        match self {
            Self::FileWrite | Self::FileDelete => Some("file"),
            Self::CommandExecute => Some("command"),
            Self::PackageInstall => Some("package"),
            Self::GenericYesNo | Self::Unknown => None,
        }
    }
}

/// A single recognised prompt awaiting an answer.
///
/// Exactly one open request may be outstanding per worker at a time; a new
/// prompt arriving before the previous reply is treated as a retry of the
/// same request with updated text (the `seq` is reused).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub worker_id: WorkerId,
    pub kind: ConfirmationKind,
    /// Raw prompt text as captured from the terminal
    pub prompt: String,
    /// Parsed fields, e.g. `file`, `command`, `package`
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub details: IndexMap<String, String>,
    /// Monotonically increasing per worker
    pub seq: u64,
    /// Capture time, epoch ms
    pub timestamp_ms: u64,
}

impl ConfirmationRequest {
    /// Fetch a parsed detail field.
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    /// Short message for transcript and UI display: the first prompt line,
    /// trimmed and capped.
    pub fn short_message(&self) -> String {
        const CAP: usize = 200;
        let line = self.prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
        if line.len() > CAP {
            let mut end = CAP;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}…", &line[..end])
        } else {
            line.to_string()
        }
    }
}

crate::builder! {
    pub struct ConfirmationRequestBuilder => ConfirmationRequest {
        into {
            worker_id: WorkerId = "wkr-test",
            prompt: String = "Continue? (y/n)",
        }
        set {
            kind: ConfirmationKind = ConfirmationKind::GenericYesNo,
            details: IndexMap<String, String> = IndexMap::new(),
            seq: u64 = 1,
            timestamp_ms: u64 = 1_000_000,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl ConfirmationRequestBuilder {
    /// Add one detail entry.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
#[path = "confirmation_tests.rs"]
mod tests;
