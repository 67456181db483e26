// src/diagnostic.rs
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Error lines: `<origin>error[ CODE]: <message>`. The origin may be any text,
/// including text glued to the keyword (`LinkError:`).
///
/// Groups: 1 origin, 2 code, 3 code prefix, 4 message.
pub static ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?)(?i:error)\s*(([A-Za-z]+)\d+)?\s*:\s*(.*)$").expect("valid error regex")
});

/// Warning lines need a source locator: `<file>(<line>[,<col>]): warning[ CODE]: <message>`.
/// The locator is what keeps MSBuild's `N Warning(s)` summary from matching.
///
/// Groups: 1 file, 2 line, 3 `,col`, 4 col, 5 code, 6 code prefix, 7 message.
pub static WARNING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*)\((\d+)(,(\d+))?\):\s*(?i:warning)\s*(([A-Za-z]+)\d+)?\s*:\s*(.*)$")
        .expect("valid warning regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Error,
    Warning,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiler or build diagnostic recognised on a single console line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Everything before the `error`/`warning` keyword, trimmed. For warnings
    /// this is the file part without the locator.
    pub origin: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    /// Full code, e.g. `CS1234` or `MSB3073`.
    pub code: Option<String>,
    /// Alphabetic part of the code, e.g. `CS`.
    pub code_prefix: Option<String>,
    pub message: String,
}

impl Diagnostic {
    /// Classify one line. The error shape is tried first, so a line that would
    /// also satisfy the warning shape is reported as an error only.
    pub fn parse(line: &str) -> Option<Diagnostic> {
        Self::parse_error(line).or_else(|| Self::parse_warning(line))
    }

    /// Just the kind, without building a [`Diagnostic`].
    pub fn classify(line: &str) -> Option<DiagnosticKind> {
        if ERROR_PATTERN.is_match(line) {
            Some(DiagnosticKind::Error)
        } else if WARNING_PATTERN.is_match(line) {
            Some(DiagnosticKind::Warning)
        } else {
            None
        }
    }

    fn parse_error(line: &str) -> Option<Diagnostic> {
        let caps = ERROR_PATTERN.captures(line)?;
        let origin = caps.get(1).map_or("", |m| m.as_str()).trim();
        let (line_no, column) = parse_locator(origin);

        Some(Diagnostic {
            kind: DiagnosticKind::Error,
            origin: origin.to_string(),
            line: line_no,
            column,
            code: caps.get(2).map(|m| m.as_str().to_string()),
            code_prefix: caps.get(3).map(|m| m.as_str().to_string()),
            message: caps.get(4).map_or("", |m| m.as_str()).trim_end().to_string(),
        })
    }

    fn parse_warning(line: &str) -> Option<Diagnostic> {
        let caps = WARNING_PATTERN.captures(line)?;

        Some(Diagnostic {
            kind: DiagnosticKind::Warning,
            origin: caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
            line: caps.get(2).and_then(|m| m.as_str().parse().ok()),
            column: caps.get(4).and_then(|m| m.as_str().parse().ok()),
            code: caps.get(5).map(|m| m.as_str().to_string()),
            code_prefix: caps.get(6).map(|m| m.as_str().to_string()),
            message: caps.get(7).map_or("", |m| m.as_str()).trim_end().to_string(),
        })
    }
}

static LOCATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d+)(?:,(\d+))?\):?$").expect("valid locator regex"));

// Pulls `(line,col)` off the end of an error origin like `Foo.cs(12,5):`.
fn parse_locator(origin: &str) -> (Option<u32>, Option<u32>) {
    match LOCATOR.captures(origin) {
        Some(caps) => (
            caps.get(1).and_then(|m| m.as_str().parse().ok()),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None),
    }
}
