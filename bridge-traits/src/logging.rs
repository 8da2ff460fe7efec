//! Host Log Forwarding
//!
//! Mobile hosts want core diagnostics in Logcat or OSLog next to their own
//! output. `core-runtime` turns every `tracing` event that passes its filter
//! into a [`LogRecord`] and hands it to the configured [`LoggerSink`].
//!
//! Records carry the id of the playback session they were emitted under, so
//! a host can group one clip's prepare, retries and failure together.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Severity, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, as used in filter directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One forwarded log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    /// Module path of the emitting code, e.g. `core_playback::manager`.
    pub target: String,
    pub message: String,
    /// Structured fields other than the message, stringified.
    pub fields: BTreeMap<String, String>,
    /// Playback session the event belongs to, if any.
    pub session_id: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            session_id: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Destination for forwarded core logs.
///
/// Implementations must not block: they are called from whatever task
/// emitted the event. Signed media URLs are already redacted by the core;
/// anything else the host considers private is the sink's to scrub.
///
/// ```ignore
/// struct Logcat;
///
/// #[async_trait]
/// impl LoggerSink for Logcat {
///     async fn log(&self, record: LogRecord) -> Result<()> {
///         android_log(record.level, &record.target, &record.message);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, record: LogRecord) -> Result<()>;

    /// Flush buffered records. Default: nothing buffered.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Records below this level are never built.
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}
