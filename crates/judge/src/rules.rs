// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic rule engine.
//!
//! A layered policy evaluated top-down; the first rule to fire wins.
//! Given identical (request, workspace_root, config) the verdict is
//! identical across runs — no clocks, no randomness, no I/O.

use fm_core::{
    ConfirmationKind, ConfirmationRequest, DecidedBy, Decision, DecisionAction, SafetyLevel,
    SupervisorConfig,
};
use regex::{Regex, RegexBuilder};
use std::path::{Component, Path, PathBuf};

/// Absolute prefixes considered system territory; writes and deletes here
/// are prohibited outright.
const SYSTEM_PREFIXES: &[&str] = &[
    "/etc", "/usr", "/bin", "/sbin", "/boot", "/dev", "/sys", "/proc", "/lib", "/lib64", "/var",
    "/root",
];

/// File extensions recognised as ordinary source/config files.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "c", "h", "cpp", "hpp", "rb", "sh",
    "css", "html", "md", "txt", "toml", "yaml", "yml", "json", "lock", "cfg", "ini", "sql",
];

/// Allowlisted command substrings that imply a long-running process; still
/// allowed, but only with a caution note.
const LONG_RUNNING_HINTS: &[&str] = &["serve", "server", "watch", "daemon", "tail -f"];

/// Package installs with a size hint above this many megabytes are cautioned.
const LARGE_INSTALL_MB: f64 = 100.0;

pub struct RuleEngine {
    workspace_root: PathBuf,
    auto_approve_safe: bool,
    auto_approve_caution: bool,
    unattended_mode: bool,
    denylist: Vec<(String, Regex)>,
    safe_commands: Vec<(String, Regex)>,
    auto_approve_dangerous: Vec<(String, Regex)>,
}

impl RuleEngine {
    pub fn new(config: &SupervisorConfig) -> Self {
        Self {
            workspace_root: normalize(&config.workspace_root),
            auto_approve_safe: config.auto_approve_safe,
            auto_approve_caution: config.auto_approve_caution,
            unattended_mode: config.unattended_mode,
            denylist: compile_globs(&config.denylist_commands),
            safe_commands: compile_globs(&config.safe_commands),
            auto_approve_dangerous: compile_globs(&config.auto_approve_dangerous),
        }
    }

    /// Classify a request. Returns level UNKNOWN when no rule fires; the
    /// hybrid engine then consults the next layer.
    pub fn evaluate(&self, request: &ConfirmationRequest) -> Decision {
        let decision = self.classify(request);
        debug_assert!(decision.respects_policy());
        decision
    }

    fn classify(&self, request: &ConfirmationRequest) -> Decision {
        match request.kind {
            ConfirmationKind::FileWrite => self.classify_file_write(request),
            ConfirmationKind::FileDelete => self.classify_file_delete(request),
            ConfirmationKind::CommandExecute => self.classify_command(request),
            ConfirmationKind::PackageInstall => self.classify_install(request),
            ConfirmationKind::GenericYesNo | ConfirmationKind::Unknown => self.abstain(),
        }
    }

    fn abstain(&self) -> Decision {
        Decision::new(
            SafetyLevel::Unknown,
            DecisionAction::Escalate,
            DecidedBy::Rules,
            "no rule matched",
        )
    }

    fn classify_file_write(&self, request: &ConfirmationRequest) -> Decision {
        let Some(path) = request.detail("file") else {
            return self.abstain();
        };
        let resolved = self.resolve(path);

        if is_device_path(&resolved) {
            return Decision::new(
                SafetyLevel::Prohibited,
                DecisionAction::Deny,
                DecidedBy::Rules,
                format!("prohibited: write touches device file {}", resolved.display()),
            );
        }
        if !self.in_workspace(&resolved) {
            if is_system_path(&resolved) {
                return Decision::new(
                    SafetyLevel::Prohibited,
                    DecisionAction::Deny,
                    DecidedBy::Rules,
                    format!(
                        "prohibited: write outside workspace targets system path {}",
                        resolved.display()
                    ),
                );
            }
            return self.dangerous(
                format!("dangerous: write outside workspace root ({})", resolved.display()),
                &format!("write {}", resolved.display()),
                Some(format!(
                    "write under the workspace root {} instead",
                    self.workspace_root.display()
                )),
            );
        }
        match extension_of(&resolved) {
            Some(ext) if SOURCE_EXTENSIONS.contains(&ext.as_str()) => Decision::new(
                SafetyLevel::Safe,
                self.safe_action(),
                DecidedBy::Rules,
                format!("safe: write to recognised source file inside workspace (.{ext})"),
            ),
            _ => self.caution(format!(
                "caution: write to file of unknown kind inside workspace ({})",
                resolved.display()
            )),
        }
    }

    fn classify_file_delete(&self, request: &ConfirmationRequest) -> Decision {
        let Some(path) = request.detail("file") else {
            return self.abstain();
        };
        let resolved = self.resolve(path);

        if resolved == Path::new("/") {
            return Decision::new(
                SafetyLevel::Prohibited,
                DecisionAction::Deny,
                DecidedBy::Rules,
                "prohibited: delete at filesystem root",
            );
        }
        if is_device_path(&resolved) || (is_system_path(&resolved) && !self.in_workspace(&resolved))
        {
            return Decision::new(
                SafetyLevel::Prohibited,
                DecisionAction::Deny,
                DecidedBy::Rules,
                format!("prohibited: delete targets system path {}", resolved.display()),
            );
        }
        // Deletes are never safe-by-default, even inside the workspace
        self.dangerous(
            format!("dangerous: file delete ({})", resolved.display()),
            &format!("delete {}", resolved.display()),
            Some("prefer moving the file aside within the workspace".to_string()),
        )
    }

    fn classify_command(&self, request: &ConfirmationRequest) -> Decision {
        let Some(command) = request.detail("command") else {
            return self.abstain();
        };
        let command = command.trim();

        if let Some(pattern) = first_match(&self.denylist, command) {
            return Decision::new(
                SafetyLevel::Prohibited,
                DecisionAction::Deny,
                DecidedBy::Rules,
                format!("prohibited: command matches denylist pattern `{pattern}`"),
            );
        }
        match first_match(&self.safe_commands, command) {
            Some(pattern) => {
                if LONG_RUNNING_HINTS.iter().any(|hint| command.contains(hint)) {
                    self.caution(format!(
                        "caution: allowlisted command looks long-running (`{command}`)"
                    ))
                } else {
                    Decision::new(
                        SafetyLevel::Safe,
                        self.safe_action(),
                        DecidedBy::Rules,
                        format!("safe: command matches allowlist pattern `{pattern}`"),
                    )
                }
            }
            None => self.dangerous(
                format!("dangerous: command not on the safe allowlist (`{command}`)"),
                command,
                None,
            ),
        }
    }

    fn classify_install(&self, request: &ConfirmationRequest) -> Decision {
        let Some(package) = request.detail("package") else {
            return self.abstain();
        };
        let size_hint_mb = request
            .detail("size_hint_mb")
            .and_then(|s| s.parse::<f64>().ok());
        if let Some(mb) = size_hint_mb {
            if mb > LARGE_INSTALL_MB {
                return self.caution(format!(
                    "caution: large install ({package}, ~{mb:.0} MB)"
                ));
            }
        }
        Decision::new(
            SafetyLevel::Safe,
            self.safe_action(),
            DecidedBy::Rules,
            format!("safe: registry package install ({package})"),
        )
    }

    fn safe_action(&self) -> DecisionAction {
        if self.auto_approve_safe {
            DecisionAction::Approve
        } else {
            DecisionAction::Escalate
        }
    }

    fn caution(&self, reasoning: String) -> Decision {
        let action = if self.auto_approve_caution {
            DecisionAction::Approve
        } else {
            DecisionAction::Escalate
        };
        Decision::new(SafetyLevel::Caution, action, DecidedBy::Rules, reasoning)
    }

    /// DANGEROUS verdict: escalate by default; in unattended mode an
    /// explicit auto-approve pattern may approve.
    fn dangerous(
        &self,
        reasoning: String,
        subject: &str,
        suggestion: Option<String>,
    ) -> Decision {
        let action = if self.unattended_mode
            && first_match(&self.auto_approve_dangerous, subject).is_some()
        {
            DecisionAction::Approve
        } else {
            DecisionAction::Escalate
        };
        let mut decision = Decision::new(SafetyLevel::Dangerous, action, DecidedBy::Rules, reasoning);
        if let Some(suggestion) = suggestion {
            decision = decision.suggest(suggestion);
        }
        decision
    }

    /// Resolve a possibly-relative path against the workspace root and
    /// collapse `.`/`..` lexically.
    fn resolve(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if path.is_absolute() {
            normalize(path)
        } else {
            normalize(&self.workspace_root.join(path))
        }
    }

    fn in_workspace(&self, path: &Path) -> bool {
        path.starts_with(&self.workspace_root)
    }
}

/// Lexically collapse `.` and `..` without touching the filesystem, so
/// `/ws/../etc/passwd` cannot masquerade as inside the workspace.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(Component::RootDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn is_system_path(path: &Path) -> bool {
    SYSTEM_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

fn is_device_path(path: &Path) -> bool {
    path.starts_with("/dev")
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Compile literal/glob patterns (`*` wildcard only) into anchored regexes.
fn compile_globs(patterns: &[String]) -> Vec<(String, Regex)> {
    patterns
        .iter()
        .filter_map(|pattern| {
            let mut source = String::from("^");
            for chunk in pattern.split('*') {
                source.push_str(&regex::escape(chunk));
                source.push_str(".*");
            }
            // split leaves one trailing ".*" too many unless the pattern
            // itself ends with '*'
            if !pattern.ends_with('*') {
                source.truncate(source.len() - 2);
            }
            source.push('$');
            match RegexBuilder::new(&source).case_insensitive(false).build() {
                Ok(regex) => Some((pattern.clone(), regex)),
                Err(e) => {
                    tracing::warn!(pattern, error = %e, "ignoring unparsable command pattern");
                    None
                }
            }
        })
        .collect()
}

fn first_match<'a>(globs: &'a [(String, Regex)], text: &str) -> Option<&'a str> {
    globs.iter().find(|(_, regex)| regex.is_match(text)).map(|(pattern, _)| pattern.as_str())
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
