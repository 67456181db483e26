// src/classifier.rs
use std::io;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::markup::{LineAnnotator, NoopAnnotator};
use crate::splitter::{LineConsumer, LineEvent};

/// Counts individual error and warning lines as they stream past and asks the
/// annotator to style each one.
///
/// Each line counts at most once; the error shape is checked first.
#[derive(Debug, Default)]
pub struct DiagnosticClassifier<A: LineAnnotator = NoopAnnotator> {
    warnings: u32,
    errors: u32,
    annotator: A,
    retain: bool,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticClassifier<NoopAnnotator> {
    pub fn new() -> Self {
        Self::with_annotator(NoopAnnotator)
    }
}

impl<A: LineAnnotator> DiagnosticClassifier<A> {
    pub fn with_annotator(annotator: A) -> Self {
        DiagnosticClassifier {
            warnings: 0,
            errors: 0,
            annotator,
            retain: false,
            diagnostics: Vec::new(),
        }
    }

    /// Keep a parsed [`Diagnostic`] for every classified line.
    pub fn retain_diagnostics(mut self, retain: bool) -> Self {
        self.retain = retain;
        self
    }

    pub fn warnings(&self) -> u32 {
        self.warnings
    }

    pub fn errors(&self) -> u32 {
        self.errors
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn annotator(&self) -> &A {
        &self.annotator
    }

    pub fn into_parts(self) -> (A, Vec<Diagnostic>) {
        (self.annotator, self.diagnostics)
    }

    fn classify(&mut self, text: &str) -> Option<DiagnosticKind> {
        if self.retain {
            let diagnostic = Diagnostic::parse(text)?;
            let kind = diagnostic.kind;
            self.diagnostics.push(diagnostic);
            Some(kind)
        } else {
            Diagnostic::classify(text)
        }
    }
}

impl<A: LineAnnotator> LineConsumer for DiagnosticClassifier<A> {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
        let Some(kind) = self.classify(line.text) else {
            return Ok(());
        };

        match kind {
            DiagnosticKind::Error => self.errors += 1,
            DiagnosticKind::Warning => self.warnings += 1,
        }
        tracing::debug!(line_number = line.line_number, %kind, "diagnostic");

        self.annotator.annotate(kind, line)
    }
}
