//! align_core - locate audio tracks inside a longer base recording
//!
//! This crate holds the alignment engine plus the pieces a front end needs
//! around it: WAV input/output, configuration, logging and the noise
//! robustness harness. The `track-align` CLI is a thin layer on top.

pub mod audio;
pub mod config;
pub mod engine;
pub mod harness;
pub mod logging;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
