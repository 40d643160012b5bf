//! Settings struct with TOML-based sections.
//!
//! Each section maps to one TOML table and can be rewritten on its own.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::ResampleQuality;
use crate::logging::LogLevel;

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Alignment engine parameters.
    #[serde(default)]
    pub engine: EngineSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Critical-noise test parameters.
    #[serde(default)]
    pub noise_test: NoiseTestSettings,
}

/// Alignment engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Rate (Hz) at which the coarse correlation runs.
    #[serde(default = "default_working_sample_rate")]
    pub working_sample_rate: f64,

    /// Worker threads per session.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Resampling algorithm.
    #[serde(default)]
    pub resample_quality: ResampleQuality,
}

fn default_working_sample_rate() -> f64 {
    16_000.0
}

fn default_thread_count() -> usize {
    1
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            working_sample_rate: default_working_sample_rate(),
            thread_count: default_thread_count(),
            resample_quality: ResampleQuality::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is not set.
    #[serde(default)]
    pub level: LogLevel,

    /// Also write a log file into this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,

    /// Print `MESSAGE:` status lines on stdout.
    #[serde(default)]
    pub send_messages: bool,
}

/// Critical-noise test parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseTestSettings {
    /// Trials per noise level; a level passes on a majority.
    #[serde(default = "default_num_tries")]
    pub num_tries: u32,

    /// Largest offset error (seconds) that still counts as a success.
    #[serde(default = "default_threshold_secs")]
    pub threshold_secs: f64,

    /// Length (seconds) of the window cut from the base for each trial.
    #[serde(default = "default_track_secs")]
    pub track_secs: f64,

    /// Fixed RNG seed for reproducible runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_num_tries() -> u32 {
    5
}

fn default_threshold_secs() -> f64 {
    1.0
}

fn default_track_secs() -> f64 {
    300.0
}

impl Default for NoiseTestSettings {
    fn default() -> Self {
        Self {
            num_tries: default_num_tries(),
            threshold_secs: default_threshold_secs(),
            track_secs: default_track_secs(),
            seed: None,
        }
    }
}

/// Config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSection {
    Engine,
    Logging,
    NoiseTest,
}

impl ConfigSection {
    /// All sections, in file order.
    pub const ALL: [ConfigSection; 3] = [
        ConfigSection::Engine,
        ConfigSection::Logging,
        ConfigSection::NoiseTest,
    ];

    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Engine => "engine",
            ConfigSection::Logging => "logging",
            ConfigSection::NoiseTest => "noise_test",
        }
    }

    /// Comment written above the table.
    pub fn description(&self) -> &'static str {
        match self {
            ConfigSection::Engine => "Alignment engine",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::NoiseTest => "Critical-noise test",
        }
    }
}
