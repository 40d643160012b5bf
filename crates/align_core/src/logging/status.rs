//! Machine-readable status lines for driving front ends.
//!
//! Each line has the form `MESSAGE:<event>;` or
//! `MESSAGE:<event>;<key>:<value>;...`, with keys in sorted order.

use std::io::{self, Write};

use parking_lot::Mutex;

use super::types::StatusEvent;

/// Writes status lines when enabled; a disabled emitter drops everything.
pub struct StatusEmitter {
    enabled: bool,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl StatusEmitter {
    /// Emitter writing to stdout when `enabled`.
    pub fn stdout(enabled: bool) -> Self {
        Self::with_writer(enabled, Box::new(io::stdout()))
    }

    /// Emitter that never writes.
    pub fn disabled() -> Self {
        Self::with_writer(false, Box::new(io::sink()))
    }

    /// Emitter writing to an arbitrary sink.
    pub fn with_writer(enabled: bool, sink: Box<dyn Write + Send>) -> Self {
        Self {
            enabled,
            sink: Mutex::new(sink),
        }
    }

    /// Whether lines are written.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit `event` with the given key/value pairs.
    pub fn emit(&self, event: StatusEvent, pairs: &[(&str, &str)]) {
        if !self.enabled {
            return;
        }
        let line = format_message(event, pairs);
        let mut sink = self.sink.lock();
        if let Err(e) = writeln!(sink, "{line}").and_then(|_| sink.flush()) {
            tracing::warn!(error = %e, event = event.as_str(), "Failed to write status line");
        }
    }

    /// Emit `event` with a single `file` key.
    pub fn emit_file(&self, event: StatusEvent, file: &str) {
        self.emit(event, &[("file", file)]);
    }

    /// Report a located track: offset and length in base samples.
    pub fn track_position(&self, file: &str, offset: i64, length: u64) {
        let offset = offset.to_string();
        let length = length.to_string();
        self.emit(
            StatusEvent::TrackPositionDetermined,
            &[
                ("determined_in", offset.as_str()),
                ("determined_length", length.as_str()),
                ("file", file),
            ],
        );
    }
}

impl std::fmt::Debug for StatusEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusEmitter")
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Render a status line without the trailing newline.
pub fn format_message(event: StatusEvent, pairs: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = pairs.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let mut line = format!("MESSAGE:{};", event.as_str());
    for (key, value) in sorted {
        line.push_str(key);
        line.push(':');
        line.push_str(value);
        line.push(';');
    }
    line
}
