//! Host text output for the `print` intrinsic.
//!
//! Scripts write text through a [`LineWriter`], which buffers until a newline
//! and hands each complete line to the host's [`OutputSink`] in one call.

use std::cell::RefCell;
use std::rc::Rc;

/// Destination for script output, one call per flushed line
pub trait OutputSink {
    fn write_line(&mut self, line: &str);
}

/// Writes lines to stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_line(&mut self, line: &str) {
        println!("{line}");
    }
}

/// Collects lines in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    lines: Rc<RefCell<Vec<String>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines written so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

impl OutputSink for CaptureSink {
    fn write_line(&mut self, line: &str) {
        self.lines.borrow_mut().push(line.to_string());
    }
}

/// Line buffer in front of a sink
pub struct LineWriter {
    pending: String,
    sink: Box<dyn OutputSink>,
}

impl LineWriter {
    pub fn new(sink: Box<dyn OutputSink>) -> Self {
        LineWriter {
            pending: String::new(),
            sink,
        }
    }

    pub fn write(&mut self, text: &str) {
        self.pending.push_str(text);
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            self.sink.write_line(&line[..line.len() - 1]);
        }
    }

    /// Emit a trailing partial line, if any
    pub fn flush(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.sink.write_line(&line);
        }
    }

    pub fn set_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.flush();
        self.sink = sink;
    }
}

impl std::fmt::Debug for LineWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineWriter")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_call_per_line() {
        let sink = CaptureSink::new();
        let mut writer = LineWriter::new(Box::new(sink.clone()));
        writer.write("hello\n");
        writer.write("a\nb\n");
        assert_eq!(sink.lines(), vec!["hello", "a", "b"]);
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let sink = CaptureSink::new();
        let mut writer = LineWriter::new(Box::new(sink.clone()));
        writer.write("par");
        assert!(sink.lines().is_empty());
        writer.write("tial\n");
        assert_eq!(sink.lines(), vec!["partial"]);
    }

    #[test]
    fn test_flush_emits_remainder() {
        let sink = CaptureSink::new();
        let mut writer = LineWriter::new(Box::new(sink.clone()));
        writer.write("tail");
        writer.flush();
        writer.flush();
        assert_eq!(sink.lines(), vec!["tail"]);
    }

    #[test]
    fn test_set_sink_flushes_old() {
        let first = CaptureSink::new();
        let second = CaptureSink::new();
        let mut writer = LineWriter::new(Box::new(first.clone()));
        writer.write("x");
        writer.set_sink(Box::new(second.clone()));
        writer.write("y\n");
        assert_eq!(first.lines(), vec!["x"]);
        assert_eq!(second.lines(), vec!["y"]);
        second.clear();
        assert!(second.lines().is_empty());
    }
}
