// src/lib.rs
pub mod classifier;
pub mod config;
pub mod diagnostic;
pub mod encoding;
pub mod error;
pub mod markup;
pub mod outcome;
pub mod scan;
pub mod splitter;
pub mod summary;

pub use error::*;

pub use classifier::DiagnosticClassifier;
pub use config::ScanConfig;
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use encoding::TextEncoding;
pub use markup::{HtmlAnnotator, LineAnnotator, MarkedLine, MarkupCollector, NoopAnnotator};
pub use outcome::{BuildResult, OutcomePolicy};
pub use scan::{ConsoleScanner, DiagnosticCounts, ScanReport};
pub use splitter::{LineConsumer, LineEvent, LineSplitter};
pub use summary::{SummaryCounter, NOT_OBSERVED};

/// Splitter that tracks MSBuild's summary totals.
pub type ConsoleParser<W> = LineSplitter<W, SummaryCounter>;

/// Splitter that counts and annotates individual diagnostic lines.
pub type ConsoleAnnotator<W, A = NoopAnnotator> = LineSplitter<W, DiagnosticClassifier<A>>;
