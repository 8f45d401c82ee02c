// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Confirmation prompt recognition.
//!
//! An ordered list of (regex, kind, extractor) runs against a bounded
//! pending buffer of recent PTY output. The list order is authoritative
//! and encodes the specificity tie-break: file_delete > file_write >
//! command_execute > package_install > generic_yes_no > unknown. The
//! first pattern to match wins; the buffer position is committed in a
//! single place after a match.

use fm_core::ConfirmationKind;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};

/// Bytes of recent output scanned for prompts.
pub const DEFAULT_SCAN_WINDOW: usize = 4 * 1024;
/// Hard cap on retained unmatched output; oldest bytes beyond this are
/// forgotten (they remain in the raw log).
pub const DEFAULT_HARD_CAP: usize = 64 * 1024;

/// A recognised prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptMatch {
    pub kind: ConfirmationKind,
    /// Extracted fields (`file`, `command`, `package`)
    pub details: IndexMap<String, String>,
    /// The prompt text, from the start of its line to the end of the match
    pub prompt: String,
}

struct PatternSpec {
    kind: ConfirmationKind,
    /// Detail key the first capture group is stored under
    field: Option<&'static str>,
    regex: Regex,
}

/// Ordered prompt matcher. Compiled once per worker manager.
pub struct ConfirmationMatcher {
    patterns: Vec<PatternSpec>,
}

impl Default for ConfirmationMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationMatcher {
    pub fn new() -> Self {
        let specs: Vec<(ConfirmationKind, Option<&'static str>, &str)> = vec![
            (
                ConfirmationKind::FileDelete,
                Some("file"),
                r#"\b(?:delete|remove)\s+(?:the\s+)?(?:file\s+|folder\s+|director(?:y|ies)\s+)?['"]?([^'"?\n]+?)['"]?\s*\?"#,
            ),
            (
                ConfirmationKind::FileWrite,
                Some("file"),
                r#"\b(?:write\s+to|create|save)\s+(?:the\s+)?(?:file\s+)?['"]?([^'"?\n]+?)['"]?\s*\?"#,
            ),
            (
                ConfirmationKind::FileWrite,
                Some("file"),
                r#"\boverwrite\s+(?:the\s+)?(?:file\s+)?['"]?([^'"?\n]+?)['"]?\s*\?"#,
            ),
            (
                ConfirmationKind::CommandExecute,
                Some("command"),
                r#"\b(?:execute|run)\b(?:\s+(?:the\s+)?command)?\s*:?\s+[`'"]?([^`'"?\n]+?)[`'"]?\s*\?"#,
            ),
            (
                ConfirmationKind::PackageInstall,
                Some("package"),
                r#"\b(?:pip3?|npm|yarn|pnpm|cargo|apt(?:-get)?|gem|brew)\s+install\s+(?:-[-\w]+\s+)*['"]?([A-Za-z0-9@._/-]+)['"]?\s*\?"#,
            ),
            (
                ConfirmationKind::PackageInstall,
                Some("package"),
                r#"\binstall\s+(?:the\s+)?(?:package\s+)?['"]?([A-Za-z0-9@._/-]+)['"]?\s*\?"#,
            ),
            (
                ConfirmationKind::GenericYesNo,
                None,
                r#"\?\s*[(\[]\s*y(?:es)?\s*/\s*no?\s*[)\]]"#,
            ),
            (
                ConfirmationKind::Unknown,
                None,
                r#"[^\n]{3}[^\n]*\?\s*[(\[][^)\]\n]{1,12}[)\]][ \t]*$"#,
            ),
        ];

        let patterns = specs
            .into_iter()
            .filter_map(|(kind, field, source)| {
                match RegexBuilder::new(source).case_insensitive(true).build() {
                    Ok(regex) => Some(PatternSpec { kind, field, regex }),
                    Err(e) => {
                        tracing::error!(%kind, error = %e, "confirmation pattern failed to compile");
                        None
                    }
                }
            })
            .collect();
        Self { patterns }
    }

    /// Find the first (most specific) prompt in `text`. Returns the match
    /// and the byte offset just past it.
    pub fn find(&self, text: &str) -> Option<(PromptMatch, usize)> {
        for spec in &self.patterns {
            let Some(caps) = spec.regex.captures(text) else {
                continue;
            };
            let whole = caps.get(0)?;
            let mut details = IndexMap::new();
            if let Some(field) = spec.field {
                let value = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
                if value.is_empty() {
                    // extraction requirement unmet; try the next pattern
                    continue;
                }
                details.insert(field.to_string(), value.to_string());
            }
            let line_start =
                text[..whole.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let prompt = text[line_start..whole.end()].trim().to_string();
            return Some((PromptMatch { kind: spec.kind, details, prompt }, whole.end()));
        }
        None
    }
}

/// Sliding window of recent, unconsumed PTY output.
///
/// Scans run against the last `scan_window` bytes; content beyond
/// `hard_cap` is dropped oldest-first. Consumption after a match is the
/// single point where the buffer position commits.
pub struct PendingBuffer {
    data: String,
    scan_window: usize,
    hard_cap: usize,
}

impl Default for PendingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_SCAN_WINDOW, DEFAULT_HARD_CAP)
    }

    pub fn with_limits(scan_window: usize, hard_cap: usize) -> Self {
        Self { data: String::new(), scan_window, hard_cap }
    }

    /// Append decoded output (ANSI already stripped).
    pub fn push_str(&mut self, s: &str) {
        self.data.push_str(s);
        if self.data.len() > self.hard_cap {
            let excess = self.data.len() - self.hard_cap;
            let cut = ceil_char_boundary(&self.data, excess);
            self.data.drain(..cut);
        }
    }

    /// Append raw bytes, decoding lossily.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Scan for a prompt; on a match, consume the buffer through the end
    /// of the matched text.
    pub fn scan(&mut self, matcher: &ConfirmationMatcher) -> Option<PromptMatch> {
        let window_start =
            ceil_char_boundary(&self.data, self.data.len().saturating_sub(self.scan_window));
        let (found, end) = matcher.find(&self.data[window_start..])?;
        self.data.drain(..window_start + end);
        Some(found)
    }

    /// Up to `max` bytes of the newest buffered output, for advisor context.
    pub fn context_tail(&self, max: usize) -> &str {
        let start = ceil_char_boundary(&self.data, self.data.len().saturating_sub(max));
        &self.data[start..]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Smallest char boundary >= `index`.
fn ceil_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
#[path = "patterns_tests.rs"]
mod tests;
