//! Console feed: a bounded, append-only list of `"[HH:MM:SS] text"` lines.

use std::collections::VecDeque;

use chrono::{Local, NaiveTime};

/// Lines kept before the oldest are dropped.
pub const MAX_CONSOLE_MESSAGES: usize = 1000;

/// Default page size for `recent`.
pub const DEFAULT_RECENT: usize = 50;

#[derive(Debug, Clone)]
pub struct ConsoleLog {
    messages: VecDeque<String>,
    capacity: usize,
}

impl Default for ConsoleLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLog {
    pub fn new() -> Self {
        Self::with_capacity(MAX_CONSOLE_MESSAGES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// A console that opens with the startup banner.
    pub fn with_banner() -> Self {
        let mut log = Self::new();
        log.append("=== Trading System Console Started ===");
        log.append(&format!(
            "Console initialized at {}",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        log.append("Ready for trading operations...");
        log
    }

    /// Timestamp and enqueue `message`. Empty messages are ignored and
    /// return `false`.
    pub fn append(&mut self, message: &str) -> bool {
        self.append_at(message, Local::now().time())
    }

    pub fn append_at(&mut self, message: &str, at: NaiveTime) -> bool {
        if message.is_empty() {
            return false;
        }
        self.messages.push_back(format_line(at, message));
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
        true
    }

    pub fn all(&self) -> Vec<String> {
        self.messages.iter().cloned().collect()
    }

    /// The last `count` lines, oldest first.
    pub fn recent(&self, count: usize) -> Vec<String> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip).cloned().collect()
    }

    /// Drop every line, then record the clear itself.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.append("Console cleared");
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

pub fn format_line(at: NaiveTime, message: &str) -> String {
    format!("[{}] {}", at.format("%H:%M:%S"), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn append_prefixes_timestamp() {
        let mut log = ConsoleLog::new();
        assert!(log.append_at("hello", t(9, 5, 7)));
        assert_eq!(log.all(), vec!["[09:05:07] hello".to_string()]);
    }

    #[test]
    fn empty_message_is_a_no_op() {
        let mut log = ConsoleLog::new();
        assert!(!log.append(""));
        assert!(log.is_empty());
    }

    #[test]
    fn capacity_drops_oldest() {
        let mut log = ConsoleLog::with_capacity(3);
        for i in 0..5 {
            log.append_at(&format!("m{i}"), t(0, 0, i));
        }
        assert_eq!(log.len(), 3);
        assert!(log.all()[0].ends_with("m2"));
    }

    #[test]
    fn recent_returns_tail_or_everything() {
        let mut log = ConsoleLog::new();
        log.append_at("a", t(1, 0, 0));
        log.append_at("b", t(1, 0, 1));
        assert_eq!(log.recent(1), vec!["[01:00:01] b".to_string()]);
        assert_eq!(log.recent(10).len(), 2);
        assert!(log.recent(0).is_empty());
    }

    #[test]
    fn clear_leaves_one_marker_line() {
        let mut log = ConsoleLog::with_banner();
        assert_eq!(log.len(), 3);
        log.clear();
        assert_eq!(log.len(), 1);
        assert!(log.all()[0].ends_with("Console cleared"));
    }
}
