use std::sync::{Mutex, PoisonError};

use crate::log::{log_level::LogLevel, log_sink::LogSink};

/// Keeps every record in memory. Used by tests that assert on what was logged.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all records logged so far.
    pub fn records(&self) -> Vec<(LogLevel, String)> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True if any record at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|(lvl, text)| *lvl == level && text.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, msg: &str, _target: &'static str) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, msg.to_owned()));
    }
}
