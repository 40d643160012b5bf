//! Logging types.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Log level for filtering messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level debugging (very verbose).
    Trace,
    /// Debug information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// Warnings.
    Warn,
    /// Errors.
    Error,
}

impl LogLevel {
    /// Directive string for `EnvFilter`.
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Events of the `MESSAGE:` status protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// The base file was decoded and handed to the engine.
    BaseRead,
    /// A track file was decoded.
    TrackRead,
    /// A track was located in the base.
    TrackPositionDetermined,
    /// An extracted segment was written.
    WroteFile,
    /// Processing of one track finished.
    Done,
    /// The base file can be opened.
    CanOpenFile,
    /// The base file cannot be opened.
    CannotOpenFile,
}

impl StatusEvent {
    /// Wire name of the event.
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusEvent::BaseRead => "base-read",
            StatusEvent::TrackRead => "track-read",
            StatusEvent::TrackPositionDetermined => "track-position-determined",
            StatusEvent::WroteFile => "wrote-file",
            StatusEvent::Done => "done",
            StatusEvent::CanOpenFile => "can-open-file",
            StatusEvent::CannotOpenFile => "cannot-open-file",
        }
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
