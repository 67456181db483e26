// src/scan.rs
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::classifier::DiagnosticClassifier;
use crate::config::ScanConfig;
use crate::diagnostic::Diagnostic;
use crate::encoding::TextEncoding;
use crate::error::ConsoleError;
use crate::markup::LineAnnotator;
use crate::outcome::BuildResult;
use crate::splitter::{LineConsumer, LineSplitter};
use crate::summary::SummaryCounter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagnosticCounts {
    pub warnings: u32,
    pub errors: u32,
}

/// What a scan saw after the stream was fully consumed.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub encoding: String,
    /// Totals from MSBuild's own summary lines (-1 when absent)
    pub summary: SummaryCounter,
    /// Individual diagnostic lines counted while streaming
    pub diagnostics: DiagnosticCounts,
    pub lines: usize,
    pub bytes: u64,
    #[serde(skip)]
    pub elapsed: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Diagnostic>,
}

/// Drives a console stream through one splitter that feeds both the summary
/// counter and the diagnostic classifier.
pub struct ConsoleScanner {
    config: ScanConfig,
    encoding: TextEncoding,
}

impl ConsoleScanner {
    pub fn new(config: ScanConfig) -> Result<Self, ConsoleError> {
        let encoding = TextEncoding::for_label(&config.encoding)?;
        Ok(ConsoleScanner { config, encoding })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Copy `input` to `output` unchanged, classifying lines on the way.
    pub fn scan<R, W, A>(
        &self,
        mut input: R,
        output: W,
        annotator: A,
    ) -> Result<ScanReport, ConsoleError>
    where
        R: Read,
        W: Write,
        A: LineAnnotator,
    {
        let start_time = Instant::now();
        let classifier = DiagnosticClassifier::with_annotator(annotator)
            .retain_diagnostics(self.config.retain_diagnostics);
        let mut splitter =
            LineSplitter::new(output, self.encoding, (SummaryCounter::new(), classifier));

        let mut buf = vec![0u8; self.config.buffer_size.max(1)];
        loop {
            let n = match input.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Still deliver what was buffered before giving up
                    close_after_failure(&mut splitter);
                    return Err(e.into());
                }
            };
            if let Err(e) = splitter.write_all(&buf[..n]) {
                close_after_failure(&mut splitter);
                return Err(e.into());
            }
        }

        splitter.close()?;
        let lines = splitter.lines_emitted();
        let bytes = splitter.bytes_forwarded();
        let (_, (summary, classifier)) = splitter.into_parts();

        let diagnostics = DiagnosticCounts {
            warnings: classifier.warnings(),
            errors: classifier.errors(),
        };
        let (_, details) = classifier.into_parts();

        let report = ScanReport {
            encoding: self.encoding.name().to_string(),
            summary,
            diagnostics,
            lines,
            bytes,
            elapsed: start_time.elapsed(),
            details,
        };

        tracing::debug!(
            lines = report.lines,
            bytes = report.bytes,
            elapsed = ?report.elapsed,
            "scan finished"
        );
        Ok(report)
    }

    /// Build result for a finished scan given the MSBuild exit code.
    pub fn outcome(&self, report: &ScanReport, exit_code: i32) -> BuildResult {
        self.config.policy.evaluate(exit_code, &report.summary)
    }
}

fn close_after_failure<W: Write, C: LineConsumer>(splitter: &mut LineSplitter<W, C>) {
    if let Err(e) = splitter.close() {
        tracing::debug!(error = %e, "close after failed scan");
    }
}
