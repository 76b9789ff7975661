// src/logger.rs

//! Base-owned logger
//!
//! Messages at or above the configured level are forwarded to `tracing`.
//! Optionally the most recent messages are kept in a bounded in-memory buffer.

use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, error, info, trace, warn};

/// Log message severity, least severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A message retained in the memory buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug)]
pub struct Logger {
    level: LogLevel,
    buffer: Option<VecDeque<LogRecord>>,
    capacity: usize,
}

impl Logger {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            buffer: None,
            capacity: 0,
        }
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.level = level;
    }

    /// Keep the last `capacity` accepted messages in memory
    pub fn enable_buffer(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.buffer = Some(VecDeque::with_capacity(capacity));
    }

    /// Buffered messages, oldest first
    pub fn messages(&self) -> Vec<LogRecord> {
        self.buffer
            .as_ref()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        if level < self.level {
            return;
        }
        let message = message.into();
        match level {
            LogLevel::Trace => trace!(target: "pkgcore", "{}", message),
            LogLevel::Debug => debug!(target: "pkgcore", "{}", message),
            LogLevel::Info => info!(target: "pkgcore", "{}", message),
            LogLevel::Warning => warn!(target: "pkgcore", "{}", message),
            LogLevel::Error => error!(target: "pkgcore", "{}", message),
        }

        if let Some(buf) = self.buffer.as_mut() {
            if self.capacity == 0 {
                return;
            }
            if buf.len() == self.capacity {
                buf.pop_front();
            }
            buf.push_back(LogRecord { level, message });
        }
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}
