// src/markup.rs
use std::io::{self, Write};

use crate::diagnostic::DiagnosticKind;
use crate::splitter::LineEvent;

const SPAN_END: &str = "</span>";

impl DiagnosticKind {
    /// Start and end tags used to style a whole diagnostic line.
    pub fn markup(&self) -> (&'static str, &'static str) {
        match self {
            DiagnosticKind::Error => ("<span class=error-inline>", SPAN_END),
            DiagnosticKind::Warning => ("<span class=warning-inline>", SPAN_END),
        }
    }

    /// Wrap `text` as-is in this kind's markup pair.
    pub fn wrap(&self, text: &str) -> String {
        let (start, end) = self.markup();
        let mut out = String::with_capacity(start.len() + text.len() + end.len());
        out.push_str(start);
        out.push_str(text);
        out.push_str(end);
        out
    }
}

/// Receives "style this line as X" requests from the classifier.
///
/// Annotation is layered on top of the console text; implementations never
/// see or change the bytes forwarded downstream.
pub trait LineAnnotator {
    fn annotate(&mut self, kind: DiagnosticKind, line: &LineEvent<'_>) -> io::Result<()>;
}

impl<A: LineAnnotator + ?Sized> LineAnnotator for &mut A {
    fn annotate(&mut self, kind: DiagnosticKind, line: &LineEvent<'_>) -> io::Result<()> {
        (**self).annotate(kind, line)
    }
}

impl<A: LineAnnotator + ?Sized> LineAnnotator for Box<A> {
    fn annotate(&mut self, kind: DiagnosticKind, line: &LineEvent<'_>) -> io::Result<()> {
        (**self).annotate(kind, line)
    }
}

/// Discards all annotation requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnnotator;

impl LineAnnotator for NoopAnnotator {
    fn annotate(&mut self, _kind: DiagnosticKind, _line: &LineEvent<'_>) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedLine {
    pub line_number: usize,
    pub kind: DiagnosticKind,
    pub text: String,
}

impl MarkedLine {
    pub fn to_markup(&self) -> String {
        self.kind.wrap(&self.text)
    }
}

/// Keeps annotation requests in memory.
#[derive(Debug, Default, Clone)]
pub struct MarkupCollector {
    pub lines: Vec<MarkedLine>,
}

impl MarkupCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LineAnnotator for MarkupCollector {
    fn annotate(&mut self, kind: DiagnosticKind, line: &LineEvent<'_>) -> io::Result<()> {
        self.lines.push(MarkedLine {
            line_number: line.line_number,
            kind,
            text: line.text.to_string(),
        });
        Ok(())
    }
}

/// Writes each annotated line, HTML-escaped and wrapped in its markup, to a
/// separate writer (one line per diagnostic).
pub struct HtmlAnnotator<W: Write> {
    out: W,
}

impl<W: Write> HtmlAnnotator<W> {
    pub fn new(out: W) -> Self {
        HtmlAnnotator { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> LineAnnotator for HtmlAnnotator<W> {
    fn annotate(&mut self, kind: DiagnosticKind, line: &LineEvent<'_>) -> io::Result<()> {
        let (start, end) = kind.markup();
        writeln!(self.out, "{}{}{}", start, escape_html(line.text), end)
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
