// src/summary.rs
use std::io;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::splitter::{LineConsumer, LineEvent};

/// Counter value before any summary line has been seen.
pub const NOT_OBSERVED: i32 = -1;

const WARNING_TOKEN: &str = "Warning(s)";
const ERROR_TOKEN: &str = "Error(s)";

static WARNING_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\sWarning\(s\)").expect("valid warning summary regex"));
static ERROR_SUMMARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\sError\(s\)").expect("valid error summary regex"));

/// Tracks the totals MSBuild prints at the end of a build:
///
/// ```text
///     3 Warning(s)
///     0 Error(s)
/// ```
///
/// Each matching line overwrites the previous value, so the last summary in the
/// stream wins. Both counters stay at [`NOT_OBSERVED`] until a summary line with
/// a parseable count appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SummaryCounter {
    warnings: i32,
    errors: i32,
}

impl Default for SummaryCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryCounter {
    pub fn new() -> Self {
        SummaryCounter {
            warnings: NOT_OBSERVED,
            errors: NOT_OBSERVED,
        }
    }

    pub fn warnings(&self) -> i32 {
        self.warnings
    }

    pub fn errors(&self) -> i32 {
        self.errors
    }

    /// `None` until a warning summary line has been parsed.
    pub fn observed_warnings(&self) -> Option<u32> {
        u32::try_from(self.warnings).ok()
    }

    /// `None` until an error summary line has been parsed.
    pub fn observed_errors(&self) -> Option<u32> {
        u32::try_from(self.errors).ok()
    }

    /// Inspect one decoded line.
    pub fn observe(&mut self, line: &str) {
        if let Some(count) = summary_count(line, &WARNING_SUMMARY, WARNING_TOKEN) {
            tracing::debug!(previous = self.warnings, count, "warning summary");
            self.warnings = count;
        }

        if let Some(count) = summary_count(line, &ERROR_SUMMARY, ERROR_TOKEN) {
            tracing::debug!(previous = self.errors, count, "error summary");
            self.errors = count;
        }
    }
}

impl LineConsumer for SummaryCounter {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
        self.observe(line.text);
        Ok(())
    }
}

/// The integer token directly before `token`, if the line has the summary shape.
/// When `token` occurs more than once, the first occurrence preceded by a valid
/// count wins.
fn summary_count(line: &str, shape: &Regex, token: &str) -> Option<i32> {
    if !shape.is_match(line) {
        return None;
    }

    let fields: Vec<&str> = line.split_whitespace().collect();
    let count = fields
        .windows(2)
        .filter(|pair| pair[1].starts_with(token))
        .find_map(|pair| pair[0].parse::<i32>().ok().filter(|count| *count >= 0));

    if count.is_none() {
        tracing::debug!(token, line, "ignoring unparseable summary count");
    }
    count
}
