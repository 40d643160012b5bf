//! Configuration management for track-align.
//!
//! This module provides:
//! - TOML-based configuration with `[engine]`, `[logging]` and `[noise_test]` sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only the changed section is modified)
//! - Per-field defaults for anything missing
//!
//! # Example
//!
//! ```no_run
//! use align_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("track-align.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Working rate: {}", config.settings().engine.working_sample_rate);
//!
//! config.settings_mut().engine.thread_count = 4;
//! config.update_section(ConfigSection::Engine).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{ConfigSection, EngineSettings, LoggingSettings, NoiseTestSettings, Settings};
