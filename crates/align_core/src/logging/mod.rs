//! Logging infrastructure for track-align.
//!
//! This module provides:
//! - Global `tracing` setup with an optional log file
//! - The `MESSAGE:` status protocol for front ends
//!
//! # Example
//!
//! ```no_run
//! use align_core::logging::{init_tracing, LogLevel, StatusEmitter, StatusEvent};
//!
//! let _guard = init_tracing(LogLevel::Info, None).unwrap();
//!
//! let status = StatusEmitter::stdout(true);
//! status.emit_file(StatusEvent::BaseRead, "base.wav");
//! ```

mod status;
mod types;

pub use status::{format_message, StatusEmitter};
pub use types::{LogLevel, StatusEvent};

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Stem of the log file written into `log_dir`.
pub const LOG_FILE_PREFIX: &str = "track-align";

/// Extension of the log file written into `log_dir`.
pub const LOG_FILE_SUFFIX: &str = "log";

/// Path of the log file [`init_tracing`] writes inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(format!("{LOG_FILE_PREFIX}.{LOG_FILE_SUFFIX}"))
}

/// Initialize the global tracing subscriber.
///
/// - `RUST_LOG` wins over `default_level`
/// - Human-readable output goes to stderr (stdout carries results)
/// - With `log_dir`, the same events are also appended to
///   [`log_file_path`] there through a non-blocking writer
///
/// Keep the returned guard alive until exit so the file is flushed. Calling
/// this again after a subscriber is installed has no effect.
pub fn init_tracing(
    default_level: LogLevel,
    log_dir: Option<&Path>,
) -> io::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_filter_str()));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix(LOG_FILE_SUFFIX)
                .build(dir)
                .map_err(io::Error::other)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_thread_ids(false),
        )
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    } else if let Some(dir) = log_dir {
        tracing::debug!(path = %log_file_path(dir).display(), "Writing log file");
    }

    Ok(guard)
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}
