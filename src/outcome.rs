// src/outcome.rs
use std::fmt;

use serde::Serialize;

use crate::summary::SummaryCounter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
}

impl BuildResult {
    /// Process exit code used by the command-line tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildResult::Success => 0,
            BuildResult::Failure => 1,
            BuildResult::Unstable => 2,
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildResult::Success => "SUCCESS",
            BuildResult::Unstable => "UNSTABLE",
            BuildResult::Failure => "FAILURE",
        };
        f.write_str(s)
    }
}

/// How the tool's exit code and the summary counts map to a build result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomePolicy {
    /// Mark the build unstable when the summary reports warnings.
    pub unstable_if_warnings: bool,
    /// Ignore a non-zero exit code from MSBuild.
    pub continue_on_build_failure: bool,
}

impl OutcomePolicy {
    pub fn evaluate(&self, exit_code: i32, summary: &SummaryCounter) -> BuildResult {
        if exit_code != 0 && !self.continue_on_build_failure {
            return BuildResult::Failure;
        }

        // An unobserved summary (-1) never makes the build unstable.
        if self.unstable_if_warnings && summary.warnings() > 0 {
            tracing::info!(warnings = summary.warnings(), "build unstable because of warnings");
            return BuildResult::Unstable;
        }

        BuildResult::Success
    }
}
