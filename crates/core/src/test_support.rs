// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for other crates' tests. Compiled only with the
//! `test-support` feature (or under `cfg(test)`).

use crate::{ConfirmationKind, ConfirmationRequest, WorkerId};

/// A representative request of the given kind, with the detail field the
/// kind requires already populated.
pub fn sample_request(kind: ConfirmationKind) -> ConfirmationRequest {
    let builder = ConfirmationRequest::builder().worker_id(WorkerId::new("wkr-test")).kind(kind);
    match kind {
        ConfirmationKind::FileWrite => builder
            .prompt("Write to file \"src/main.rs\"? (y/n)")
            .detail("file", "src/main.rs"),
        ConfirmationKind::FileDelete => {
            builder.prompt("Delete file \"old.txt\"? (y/n)").detail("file", "old.txt")
        }
        ConfirmationKind::CommandExecute => {
            builder.prompt("Run: cargo test? (y/n)").detail("command", "cargo test")
        }
        ConfirmationKind::PackageInstall => {
            builder.prompt("Install package serde? (y/n)").detail("package", "serde")
        }
        ConfirmationKind::GenericYesNo => builder.prompt("Continue? (y/n)"),
        ConfirmationKind::Unknown => builder.prompt("Proceed with scaffolding? [y/N]"),
    }
    .build()
}
