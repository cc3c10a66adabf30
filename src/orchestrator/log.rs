//! Ordered, human-readable run log.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity tag of a run log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
    Summary,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Error => "error",
            Severity::Summary => "summary",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Emission order within the run, starting at 1
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub severity: Severity,
    pub message: String,
}

/// Append-only destination for run log lines.
pub trait LogSink: Send + Sync {
    fn emit(&self, entry: LogEntry);
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Entries with the given severity.
    pub fn with_severity(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.severity == severity)
            .collect()
    }
}

impl LogSink for MemoryLog {
    fn emit(&self, entry: LogEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(entry);
    }
}

/// Forwards entries to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn emit(&self, entry: LogEntry) {
        match entry.severity {
            Severity::Error => {
                tracing::error!(seq = entry.seq, severity = %entry.severity, "{}", entry.message)
            }
            _ => tracing::info!(seq = entry.seq, severity = %entry.severity, "{}", entry.message),
        }
    }
}

/// Prints `[severity] message` to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLog;

impl LogSink for StdoutLog {
    fn emit(&self, entry: LogEntry) {
        println!(
            "{} [{}] {}",
            entry.at.format("%H:%M:%S%.3f"),
            entry.severity,
            entry.message
        );
    }
}

/// Sends every entry to each inner sink, in order.
#[derive(Clone, Default)]
pub struct FanOutLog {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanOutLog {
    pub fn new(sinks: Vec<Arc<dyn LogSink>>) -> Self {
        Self { sinks }
    }
}

impl LogSink for FanOutLog {
    fn emit(&self, entry: LogEntry) {
        for sink in &self.sinks {
            sink.emit(entry.clone());
        }
    }
}

/// Per-run writer assigning sequence numbers and timestamps.
pub(crate) struct RunLog<'a> {
    sink: &'a dyn LogSink,
    next_seq: u64,
}

impl<'a> RunLog<'a> {
    pub(crate) fn new(sink: &'a dyn LogSink) -> Self {
        Self { sink, next_seq: 1 }
    }

    pub(crate) fn emit(&mut self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry {
            seq: self.next_seq,
            at: Utc::now(),
            severity,
            message: message.into(),
        };
        self.next_seq += 1;
        self.sink.emit(entry);
    }

    pub(crate) fn info(&mut self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub(crate) fn success(&mut self, message: impl Into<String>) {
        self.emit(Severity::Success, message);
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }

    pub(crate) fn summary(&mut self, message: impl Into<String>) {
        self.emit(Severity::Summary, message);
    }
}
