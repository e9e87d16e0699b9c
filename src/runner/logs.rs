//! Bounded log ring for the supervised process.

use std::collections::VecDeque;

/// Lines kept per run.
pub const MAX_LOG_LINES: usize = 300;

#[derive(Debug, Clone)]
pub struct LogBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_LOG_LINES)
    }
}

impl LogBuffer {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a line, dropping the oldest once full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_most_recent_lines() {
        let mut logs = LogBuffer::default();
        for i in 0..MAX_LOG_LINES + 5 {
            logs.push(format!("line {i}"));
        }
        assert_eq!(logs.len(), MAX_LOG_LINES);
        let lines = logs.to_vec();
        assert_eq!(lines.first().unwrap(), "line 5");
        assert_eq!(lines.last().unwrap(), &format!("line {}", MAX_LOG_LINES + 4));
    }

    #[test]
    fn test_clear_and_zero_capacity() {
        let mut logs = LogBuffer::with_capacity(2);
        logs.push("a");
        logs.clear();
        assert!(logs.is_empty());

        let mut none = LogBuffer::with_capacity(0);
        none.push("dropped");
        assert!(none.is_empty());
    }
}
