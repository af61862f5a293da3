//! # Logger Service
//!
//! This crate implements structured logging for the scheduling engine.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Every entry carries a level, an optional source (core or process) and
//! key/value fields. Entries are retained in a bounded in-memory ring so
//! tests and front-ends can inspect them, and are forwarded to the `log`
//! facade so a host binary can attach any backend.

use core_types::{CoreId, Pid};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl LogLevel {
    fn as_log_level(self) -> log::Level {
        match self {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// Component that produced a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// A multi-core scheduler worker
    Core(CoreId),
    /// The I/O completion manager
    IoManager,
    /// The RTOS scheduling loop
    Rtos,
    /// A command issued by the control layer
    Controller,
    /// A specific process
    Process(Pid),
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSource::Core(core) => write!(f, "{}", core),
            LogSource::IoManager => f.write_str("io"),
            LogSource::Rtos => f.write_str("rtos"),
            LogSource::Controller => f.write_str("ctl"),
            LogSource::Process(pid) => write!(f, "{}", pid),
        }
    }
}

/// A structured log entry
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source component (if known)
    pub source: Option<LogSource>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            source: None,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Sets the source component
    pub fn with_source(mut self, source: LogSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.push((key.into(), value.to_string()));
        self
    }

    /// Looks up a field value by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = self.source {
            write!(f, "[{}] ", source)?;
        }
        f.write_str(&self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Default number of entries retained by a [`Logger`]
pub const DEFAULT_CAPACITY: usize = 1024;

/// Shared, bounded log sink
///
/// Cloning a `Logger` yields another handle to the same ring. When the ring
/// is full the oldest entry is dropped.
#[derive(Debug, Clone)]
pub struct Logger {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Logger {
    /// Creates a logger with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a logger retaining at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(4096)))),
            capacity: capacity.max(1),
        }
    }

    /// Records an entry and forwards it to the `log` facade
    pub fn record(&self, entry: LogEntry) {
        log::log!(target: "schedsim", entry.level.as_log_level(), "{}", entry);
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn debug(&self, source: LogSource, message: impl Into<String>) -> EntryBuilder<'_> {
        EntryBuilder::new(self, LogLevel::Debug, source, message)
    }

    pub fn info(&self, source: LogSource, message: impl Into<String>) -> EntryBuilder<'_> {
        EntryBuilder::new(self, LogLevel::Info, source, message)
    }

    pub fn warn(&self, source: LogSource, message: impl Into<String>) -> EntryBuilder<'_> {
        EntryBuilder::new(self, LogLevel::Warn, source, message)
    }

    pub fn error(&self, source: LogSource, message: impl Into<String>) -> EntryBuilder<'_> {
        EntryBuilder::new(self, LogLevel::Error, source, message)
    }

    /// Returns a copy of the retained entries, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns retained entries at or above `level`
    pub fn entries_at_least(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level >= level)
            .cloned()
            .collect()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops all retained entries
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Installs a stderr backend for the `log` facade
    ///
    /// Only the first call in a process takes effect; later calls return
    /// false.
    pub fn install_stderr(max_level: LogLevel) -> bool {
        let filter = max_level.as_log_level().to_level_filter();
        match log::set_boxed_logger(Box::new(StderrBackend { max_level: filter })) {
            Ok(()) => {
                log::set_max_level(filter);
                true
            }
            Err(_) => false,
        }
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder returned by the level helpers on [`Logger`]
///
/// The entry is recorded when [`EntryBuilder::emit`] is called.
#[must_use = "call emit() to record the entry"]
pub struct EntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> EntryBuilder<'a> {
    fn new(
        logger: &'a Logger,
        level: LogLevel,
        source: LogSource,
        message: impl Into<String>,
    ) -> Self {
        Self {
            logger,
            entry: LogEntry::new(level, message).with_source(source),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.entry = self.entry.with_field(key, value);
        self
    }

    pub fn emit(self) {
        self.logger.record(self.entry);
    }
}

struct StderrBackend {
    max_level: log::LevelFilter,
}

impl log::Log for StderrBackend {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            eprintln!("{:<5} {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}
