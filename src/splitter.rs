// src/splitter.rs
use std::io::{self, Write};

use memchr::memchr;

use crate::encoding::TextEncoding;
use crate::error::ConsoleError;

/// One line detected in the byte stream.
///
/// `text` is decoded and has its trailing CR/LF removed; `raw` holds the exact
/// bytes received for this line, terminator included.
#[derive(Debug, Clone, Copy)]
pub struct LineEvent<'a> {
    pub text: &'a str,
    pub raw: &'a [u8],
    /// 1-based position of the line in the stream
    pub line_number: usize,
}

impl LineEvent<'_> {
    /// Number of raw bytes, terminator included.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// True when the line ended at stream close rather than at a `\n`.
    pub fn is_unterminated(&self) -> bool {
        self.raw.last() != Some(&b'\n')
    }
}

/// Receives every line a [`LineSplitter`] detects, in stream order.
pub trait LineConsumer {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()>;

    /// Called once, after the trailing partial line (if any) has been delivered.
    fn on_close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LineConsumer for () {
    fn on_line(&mut self, _line: &LineEvent<'_>) -> io::Result<()> {
        Ok(())
    }
}

impl<C: LineConsumer + ?Sized> LineConsumer for &mut C {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
        (**self).on_line(line)
    }

    fn on_close(&mut self) -> io::Result<()> {
        (**self).on_close()
    }
}

impl<C: LineConsumer + ?Sized> LineConsumer for Box<C> {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
        (**self).on_line(line)
    }

    fn on_close(&mut self) -> io::Result<()> {
        (**self).on_close()
    }
}

/// Both halves always see the line; the first error is reported.
impl<A: LineConsumer, B: LineConsumer> LineConsumer for (A, B) {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
        let first = self.0.on_line(line);
        let second = self.1.on_line(line);
        first.and(second)
    }

    fn on_close(&mut self) -> io::Result<()> {
        let first = self.0.on_close();
        let second = self.1.on_close();
        first.and(second)
    }
}

impl<C: LineConsumer> LineConsumer for Vec<C> {
    fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
        let mut result = Ok(());
        for consumer in self.iter_mut() {
            result = result.and(consumer.on_line(line));
        }
        result
    }

    fn on_close(&mut self) -> io::Result<()> {
        let mut result = Ok(());
        for consumer in self.iter_mut() {
            result = result.and(consumer.on_close());
        }
        result
    }
}

/// Splits a byte stream into lines for a consumer while passing every byte
/// through to `out` unchanged.
///
/// Chunks may end anywhere: inside a line, between `\r` and `\n`, or inside a
/// multi-byte character. Bytes after the last `\n` stay buffered until the next
/// write or until [`close`](LineSplitter::close). Each line's raw bytes are
/// written downstream before the consumer sees it.
///
/// A chunk handed to [`write`](Write::write) is always taken in full, so callers
/// never retry bytes that were already forwarded:
///
/// * a downstream failure is held back and returned by the next `write`,
///   `flush` or `close`. That `write` takes nothing from its chunk. Lines
///   completed before then still reach the consumer but are not forwarded.
/// * a consumer failure does not stop the bytes. Splitting goes on, the
///   consumer keeps seeing later lines, and the first such error is returned
///   by `close`.
pub struct LineSplitter<W: Write, C: LineConsumer> {
    out: W,
    consumer: C,
    encoding: TextEncoding,
    pending: Vec<u8>,
    line_number: usize,
    bytes_forwarded: u64,
    sink_error: Option<io::Error>,
    consumer_error: Option<io::Error>,
    closed: bool,
}

impl<W: Write, C: LineConsumer> LineSplitter<W, C> {
    pub fn new(out: W, encoding: TextEncoding, consumer: C) -> Self {
        LineSplitter {
            out,
            consumer,
            encoding,
            pending: Vec::new(),
            line_number: 0,
            bytes_forwarded: 0,
            sink_error: None,
            consumer_error: None,
            closed: false,
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn consumer(&self) -> &C {
        &self.consumer
    }

    pub fn consumer_mut(&mut self) -> &mut C {
        &mut self.consumer
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Lines delivered so far.
    pub fn lines_emitted(&self) -> usize {
        self.line_number
    }

    /// Bytes written downstream so far.
    pub fn bytes_forwarded(&self) -> u64 {
        self.bytes_forwarded
    }

    /// Bytes received but not yet part of a complete line.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Deliver the trailing unterminated line, if any, then flush downstream.
    ///
    /// Returns the held-back downstream error first, then the first consumer
    /// error. Safe to call more than once: later calls have nothing to deliver
    /// and only flush the sink again.
    pub fn close(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let raw = std::mem::take(&mut self.pending);
            self.emit(&raw);
        }

        if !self.closed {
            self.closed = true;
            if let Err(e) = self.consumer.on_close() {
                self.consumer_failed(e);
            }
        }

        let flushed = self.out.flush();
        if let Some(e) = self.sink_error.take() {
            return Err(e);
        }
        if let Some(e) = self.consumer_error.take() {
            return Err(e);
        }
        flushed
    }

    /// Close the stream and hand back the sink and the consumer.
    pub fn finish(mut self) -> io::Result<(W, C)> {
        self.close()?;
        Ok(self.into_parts())
    }

    /// Take the sink and consumer apart without closing; pending bytes are lost.
    pub fn into_parts(self) -> (W, C) {
        (self.out, self.consumer)
    }

    fn drain_lines(&mut self, search_from: usize) {
        let mut pending = std::mem::take(&mut self.pending);
        let mut line_start = 0;
        let mut search_from = search_from;

        while let Some(offset) = memchr(b'\n', &pending[search_from..]) {
            let line_end = search_from + offset + 1;
            self.emit(&pending[line_start..line_end]);
            line_start = line_end;
            search_from = line_end;
        }

        pending.drain(..line_start);
        self.pending = pending;
    }

    fn emit(&mut self, raw: &[u8]) {
        self.line_number += 1;
        let line_number = self.line_number;

        // Lines arriving while a downstream error waits to be reported are not forwarded.
        if self.sink_error.is_none() {
            match self.out.write_all(raw) {
                Ok(()) => self.bytes_forwarded += raw.len() as u64,
                Err(e) => {
                    tracing::debug!(line_number, error = %e, "downstream write failed");
                    self.sink_error = Some(e);
                }
            }
        }

        let content = strip_terminator(raw);
        let decoded = self.encoding.decode(content);
        let text = decoded.trim_end_matches(['\r', '\n']);

        tracing::trace!(line_number, bytes = raw.len(), "line");

        let event = LineEvent {
            text,
            raw,
            line_number,
        };
        if let Err(e) = self.consumer.on_line(&event) {
            self.consumer_failed(e);
        }
    }

    fn consumer_failed(&mut self, e: io::Error) {
        tracing::debug!(line_number = self.line_number, error = %e, "line consumer failed");
        if self.consumer_error.is_none() {
            self.consumer_error = Some(e);
        }
    }
}

impl<W: Write, C: LineConsumer> Write for LineSplitter<W, C> {
    fn write(&mut self, chunk: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(ConsoleError::Closed.into());
        }
        if let Some(e) = self.sink_error.take() {
            return Err(e);
        }

        // Pending bytes never contain '\n', so only the new chunk needs scanning.
        let search_from = self.pending.len();
        self.pending.extend_from_slice(chunk);
        self.drain_lines(search_from);
        Ok(chunk.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(e) = self.sink_error.take() {
            return Err(e);
        }
        self.out.flush()
    }
}

fn strip_terminator(raw: &[u8]) -> &[u8] {
    match raw {
        [rest @ .., b'\r', b'\n'] => rest,
        [rest @ .., b'\n'] => rest,
        _ => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        lines: Vec<(String, Vec<u8>)>,
        closes: usize,
    }

    impl LineConsumer for Recorder {
        fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
            self.lines.push((line.text.to_string(), line.raw.to_vec()));
            Ok(())
        }

        fn on_close(&mut self) -> io::Result<()> {
            self.closes += 1;
            Ok(())
        }
    }

    fn splitter() -> LineSplitter<Vec<u8>, Recorder> {
        LineSplitter::new(Vec::new(), TextEncoding::UTF_8, Recorder::default())
    }

    #[test]
    fn test_strip_terminator() {
        assert_eq!(strip_terminator(b"abc\r\n"), b"abc");
        assert_eq!(strip_terminator(b"abc\n"), b"abc");
        assert_eq!(strip_terminator(b"abc"), b"abc");
        assert_eq!(strip_terminator(b"\n"), b"");
    }

    #[test]
    fn test_lines_and_raw_bytes() {
        let mut s = splitter();
        s.write_all(b"one\r\ntwo\nthree").unwrap();

        let texts: Vec<&str> = s.consumer().lines.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(s.consumer().lines[0].1, b"one\r\n");
        assert_eq!(s.pending_len(), 5);
        // Only complete lines have been forwarded so far
        assert_eq!(s.get_ref(), b"one\r\ntwo\n");
    }

    #[test]
    fn test_crlf_split_across_chunks() {
        let mut s = splitter();
        s.write_all(b"abc\r").unwrap();
        assert!(s.consumer().lines.is_empty());
        s.write_all(b"\ndef\n").unwrap();

        let (out, rec) = s.finish().unwrap();
        assert_eq!(rec.lines[0].0, "abc");
        assert_eq!(rec.lines[0].1, b"abc\r\n");
        assert_eq!(rec.lines[1].0, "def");
        assert_eq!(out, b"abc\r\ndef\n");
    }

    #[test]
    fn test_trailing_partial_line_on_close() {
        let mut s = splitter();
        s.write_all(b"abc").unwrap();
        s.close().unwrap();

        assert_eq!(s.consumer().lines.len(), 1);
        assert_eq!(s.consumer().lines[0].0, "abc");
        assert_eq!(s.get_ref(), b"abc");
    }

    #[test]
    fn test_double_close() {
        let mut s = splitter();
        s.write_all(b"x\ny").unwrap();
        s.close().unwrap();
        s.close().unwrap();

        assert_eq!(s.consumer().lines.len(), 2);
        assert_eq!(s.consumer().closes, 1);
        assert_eq!(s.get_ref(), b"x\ny");
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut s = splitter();
        s.close().unwrap();
        let err = s.write(b"late\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_empty_lines() {
        let mut s = splitter();
        s.write_all(b"\n\r\n\n").unwrap();
        let (_, rec) = s.finish().unwrap();
        assert_eq!(rec.lines.len(), 3);
        assert!(rec.lines.iter().all(|(t, _)| t.is_empty()));
    }

    #[test]
    fn test_extra_carriage_returns_trimmed() {
        let mut s = splitter();
        s.write_all(b"abc\r\r\n").unwrap();
        assert_eq!(s.consumer().lines[0].0, "abc");
        assert_eq!(s.consumer().lines[0].1, b"abc\r\r\n");
    }

    #[test]
    fn test_downstream_failure_propagates() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "console gone"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut s = LineSplitter::new(Broken, TextEncoding::UTF_8, ());
        s.write_all(b"line\n").unwrap();
        assert_eq!(s.pending_len(), 0);
        assert_eq!(s.bytes_forwarded(), 0);

        let err = s.flush().unwrap_err();
        assert_eq!(err.to_string(), "console gone");
    }

    /// Fails its first write, then accepts everything.
    struct FailsOnce {
        failed: bool,
        written: Vec<u8>,
    }

    impl Write for FailsOnce {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if !self.failed {
                self.failed = true;
                return Err(io::Error::new(io::ErrorKind::Other, "console busy"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_downstream_error_reported_on_next_write() {
        let out = FailsOnce {
            failed: false,
            written: Vec::new(),
        };
        let mut s = LineSplitter::new(out, TextEncoding::UTF_8, Recorder::default());

        // The chunk is taken in full even though its line could not be forwarded
        assert_eq!(s.write(b"lost\n").unwrap(), 5);

        let err = s.write(b"kept\n").unwrap_err();
        assert_eq!(err.to_string(), "console busy");

        // Retrying the refused chunk forwards it exactly once
        s.write_all(b"kept\n").unwrap();
        let (out, rec) = s.finish().unwrap();
        assert_eq!(out.written, b"kept\n");
        assert_eq!(rec.lines.len(), 2);
    }

    #[test]
    fn test_close_reports_held_back_downstream_error() {
        let out = FailsOnce {
            failed: false,
            written: Vec::new(),
        };
        let mut s = LineSplitter::new(out, TextEncoding::UTF_8, Recorder::default());
        s.write_all(b"a\nb\nc").unwrap();

        let err = s.close().unwrap_err();
        assert_eq!(err.to_string(), "console busy");
        // Every line still reached the consumer
        assert_eq!(s.consumer().lines.len(), 3);
        assert_eq!(s.consumer().closes, 1);
        assert!(s.get_ref().written.is_empty());

        s.close().unwrap();
    }

    /// Rejects every line containing `marker`.
    struct Rejects {
        marker: &'static str,
        seen: usize,
    }

    impl LineConsumer for Rejects {
        fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
            self.seen += 1;
            if line.text.contains(self.marker) {
                return Err(io::Error::new(io::ErrorKind::Other, "markup disk full"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_consumer_failure_still_forwards_bytes() {
        let input: &[u8] = b"ok\nA.cs(1,1): error CS1: boom\nafter\nB.cs(2,2): error CS2: again\ntail";

        for size in 1..=input.len() {
            let consumer = Rejects {
                marker: "error",
                seen: 0,
            };
            let mut s = LineSplitter::new(Vec::new(), TextEncoding::UTF_8, consumer);
            for chunk in input.chunks(size) {
                s.write_all(chunk).unwrap();
            }

            let err = s.close().unwrap_err();
            assert_eq!(err.to_string(), "markup disk full");
            assert_eq!(s.get_ref().as_slice(), input, "chunk size {}", size);
            assert_eq!(s.bytes_forwarded(), input.len() as u64);
            assert_eq!(s.consumer().seen, 5);

            // The error is reported once
            s.close().unwrap();
        }
    }

    #[test]
    fn test_tuple_consumer_keeps_feeding_second_half() {
        let first = Rejects {
            marker: "x",
            seen: 0,
        };
        let mut s = LineSplitter::new(
            Vec::new(),
            TextEncoding::UTF_8,
            (first, Recorder::default()),
        );
        s.write_all(b"x\ny\n").unwrap();
        assert!(s.close().is_err());

        let (out, (first, second)) = s.into_parts();
        assert_eq!(out, b"x\ny\n");
        assert_eq!(first.seen, 2);
        assert_eq!(second.lines.len(), 2);
        assert_eq!(second.closes, 1);
    }

    #[test]
    fn test_line_numbers() {
        let mut s = splitter();
        let mut numbers = Vec::new();
        struct Numbers<'a>(&'a mut Vec<usize>);
        impl LineConsumer for Numbers<'_> {
            fn on_line(&mut self, line: &LineEvent<'_>) -> io::Result<()> {
                self.0.push(line.line_number);
                Ok(())
            }
        }
        {
            let mut n = LineSplitter::new(Vec::new(), TextEncoding::UTF_8, Numbers(&mut numbers));
            n.write_all(b"a\nb\nc").unwrap();
            n.close().unwrap();
        }
        assert_eq!(numbers, vec![1, 2, 3]);

        s.write_all(b"a\n").unwrap();
        assert_eq!(s.lines_emitted(), 1);
        assert_eq!(s.bytes_forwarded(), 2);
    }
}
