//! Per-subsystem user-facing log sinks
//!
//! Each subsystem gets its own bounded, append-only list. Past the cap the
//! oldest entry is evicted. Every append is mirrored to `tracing`.

use std::collections::{BTreeMap, VecDeque};
use tracing::{info, warn};

use crate::types::Subsystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug)]
pub struct Logbook {
    capacity: usize,
    sinks: BTreeMap<Subsystem, VecDeque<LogEntry>>,
}

impl Logbook {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), sinks: BTreeMap::new() }
    }

    pub fn append(&mut self, subsystem: Subsystem, severity: Severity, message: impl Into<String>) -> &LogEntry {
        let message = message.into();
        match severity {
            Severity::Info => info!(subsystem = %subsystem, message = %message, "Log entry"),
            Severity::Error => warn!(subsystem = %subsystem, message = %message, "Log entry"),
        }

        let sink = self.sinks.entry(subsystem).or_default();
        while sink.len() >= self.capacity {
            sink.pop_front();
        }
        sink.push_back(LogEntry { severity, message });
        // Just pushed
        &sink[sink.len() - 1]
    }

    /// Oldest first
    pub fn entries(&self, subsystem: Subsystem) -> impl Iterator<Item = &LogEntry> {
        self.sinks.get(&subsystem).into_iter().flatten()
    }

    pub fn last(&self, subsystem: Subsystem) -> Option<&LogEntry> {
        self.sinks.get(&subsystem).and_then(VecDeque::back)
    }

    #[cfg(test)]
    pub fn len(&self, subsystem: Subsystem) -> usize {
        self.sinks.get(&subsystem).map_or(0, VecDeque::len)
    }

    #[cfg(test)]
    pub fn is_empty(&self, subsystem: Subsystem) -> bool {
        self.len(subsystem) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinks_are_independent() {
        let mut logbook = Logbook::new(10);
        logbook.append(Subsystem::Network, Severity::Info, "connected");
        logbook.append(Subsystem::Audio, Severity::Error, "pactl command not found.");

        assert_eq!(logbook.len(Subsystem::Network), 1);
        assert_eq!(logbook.len(Subsystem::Audio), 1);
        assert!(logbook.is_empty(Subsystem::Bluetooth));
        assert!(logbook.entries(Subsystem::Audio).all(LogEntry::is_error));
    }

    #[test]
    fn test_oldest_evicted_past_capacity() {
        let mut logbook = Logbook::new(3);
        for i in 0..5 {
            logbook.append(Subsystem::Bluetooth, Severity::Info, format!("line {i}"));
        }

        let messages: Vec<_> = logbook.entries(Subsystem::Bluetooth).map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_zero_capacity_still_keeps_latest() {
        let mut logbook = Logbook::new(0);
        logbook.append(Subsystem::Network, Severity::Info, "a");
        logbook.append(Subsystem::Network, Severity::Info, "b");
        assert_eq!(logbook.len(Subsystem::Network), 1);
        assert_eq!(logbook.entries(Subsystem::Network).next().unwrap().message, "b");
    }

    #[test]
    fn test_append_returns_new_entry() {
        let mut logbook = Logbook::new(crate::constants::logbook::DEFAULT_CAPACITY);
        let entry = logbook.append(Subsystem::Network, Severity::Error, "nmcli failed: no device");
        assert_eq!(entry.message, "nmcli failed: no device");
        assert!(entry.is_error());
    }

    #[test]
    fn test_last_is_newest_entry() {
        let mut logbook = Logbook::new(2);
        assert_eq!(logbook.last(Subsystem::Audio), None);
        for message in ["one", "two", "three"] {
            logbook.append(Subsystem::Audio, Severity::Info, message);
        }
        assert_eq!(logbook.last(Subsystem::Audio).map(|e| e.message.as_str()), Some("three"));
        assert_eq!(logbook.last(Subsystem::Network), None);
    }
}
