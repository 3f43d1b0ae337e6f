//! Diagnostic output handling.
//!
//! ffmpeg rewrites its status line in place with `\r`, so both `\r` and
//! `\n` are treated as line terminators.

use std::collections::VecDeque;

/// Bounded buffer holding the most recent diagnostic lines.
#[derive(Debug, Clone)]
pub struct DiagnosticTail {
    lines: VecDeque<String>,
    capacity: usize,
}

impl DiagnosticTail {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Retained lines joined with newlines, for error messages.
    pub fn excerpt(&self) -> String {
        self.lines
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Incremental splitter turning raw output chunks into trimmed lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                self.take_pending(&mut lines);
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Flush whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        let mut lines = Vec::new();
        self.take_pending(&mut lines);
        lines.pop()
    }

    fn take_pending(&mut self, lines: &mut Vec<String>) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        if !line.is_empty() {
            lines.push(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_keeps_most_recent_lines() {
        let mut tail = DiagnosticTail::new(2);
        tail.push("a");
        tail.push("b");
        tail.push("c");
        assert_eq!(tail.excerpt(), "b\nc");
    }

    #[test]
    fn test_zero_capacity_tail_stays_empty() {
        let mut tail = DiagnosticTail::new(0);
        tail.push("a");
        assert!(tail.is_empty());
    }

    #[test]
    fn test_splitter_handles_carriage_returns() {
        let mut splitter = LineSplitter::default();
        let lines = splitter.push(b"frame=  1 time=00:00:00.04\rframe=  2 time=00:00:00.08\r");
        assert_eq!(
            lines,
            vec!["frame=  1 time=00:00:00.04", "frame=  2 time=00:00:00.08"]
        );
    }

    #[test]
    fn test_splitter_joins_lines_across_chunks() {
        let mut splitter = LineSplitter::default();
        assert!(splitter.push(b"  Duration: 00:0").is_empty());
        let lines = splitter.push(b"1:05.00, start\r\n\nnext");
        assert_eq!(lines, vec!["Duration: 00:01:05.00, start"]);
        assert_eq!(splitter.finish().as_deref(), Some("next"));
        assert_eq!(splitter.finish(), None);
    }
}
