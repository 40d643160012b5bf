//! Command line definition and validation.

use std::path::{Path, PathBuf};

use align_core::config::Settings;
use align_core::engine::ResampleQuality;
use align_core::logging::LogLevel;
use clap::Parser;

/// Suffix appended to an input's path by `--default-output`.
pub const DEFAULT_OUTPUT_SUFFIX: &str = ".aligned.wav";

/// track-align - find where recordings sit inside a longer base recording
#[derive(Parser, Debug)]
#[command(name = "track-align", version, about, long_about = None)]
pub struct Cli {
    /// Base recording the tracks are located in
    #[arg(short = 'b', long, value_name = "FILE")]
    pub base: Option<PathBuf>,

    /// Tracks to locate in the base
    #[arg(short = 'i', long = "input", value_name = "FILE", num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// Where to write the matching base segment, one per input
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        num_args = 1..,
        conflicts_with = "default_output"
    )]
    pub outputs: Vec<PathBuf>,

    /// Write each segment next to its input as `<input>.aligned.wav`
    #[arg(short = 'd', long)]
    pub default_output: bool,

    /// Print `MESSAGE:` status lines on stdout
    #[arg(short = 'm', long)]
    pub send_messages: bool,

    /// Working sample rate in Hz (higher is slower and more precise)
    #[arg(short = 's', long, value_name = "HZ", value_parser = parse_positive_f64)]
    pub sample_rate: Option<f64>,

    /// Worker threads per session
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Resampling quality: 0-4 or nearest, linear, sinc_fastest, sinc_medium, sinc_best
    #[arg(short = 'Q', long, value_name = "QUALITY")]
    pub quality: Option<ResampleQuality>,

    /// Measure the critical noise level of the base instead of matching
    #[arg(short = 't', long)]
    pub test: bool,

    /// Trials per noise level in test mode
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub num_tries: Option<u32>,

    /// Largest offset error in seconds that counts as a successful trial
    #[arg(long, value_name = "SECS", value_parser = parse_threshold)]
    pub test_threshold: Option<f64>,

    /// Length in seconds of the tracks cut from the base in test mode
    #[arg(long, value_name = "SECS", value_parser = parse_positive_f64)]
    pub test_track_size: Option<f64>,

    /// Seed for the test-mode random generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Only check whether the base can be opened
    #[arg(short = 'c', long)]
    pub can_open_base: bool,

    /// Do nothing and exit successfully
    #[arg(short = 'r', long)]
    pub return_only: bool,

    /// Only print warnings and errors
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Print debug output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Configuration file (missing file means defaults)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results as JSON lines
    #[arg(long)]
    pub json: bool,
}

/// What a validated command line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Critical-noise search on the base.
    Test { base: PathBuf },
    /// Check the base can be opened.
    CanOpen { base: PathBuf },
    /// Locate each input, optionally writing segments.
    Process { base: PathBuf, jobs: Vec<Job> },
}

/// One track to locate.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

impl Cli {
    /// Check option combinations and pick the run mode.
    pub fn mode(&self) -> Result<Mode, String> {
        let base = self
            .base
            .clone()
            .ok_or_else(|| "A base file is required (-b).".to_string())?;

        let has_output = self.test
            || self.send_messages
            || self.default_output
            || !self.outputs.is_empty()
            || self.can_open_base;
        if !has_output {
            return Err("No output. One of [-o, -d, -t, -m, -c] is required.".to_string());
        }
        let has_input = self.test || !self.inputs.is_empty() || self.can_open_base;
        if !has_input {
            return Err("No input. One of [-t, -i, -c] is required.".to_string());
        }

        if self.test {
            return Ok(Mode::Test { base });
        }
        if self.can_open_base {
            return Ok(Mode::CanOpen { base });
        }

        if !self.outputs.is_empty() && self.outputs.len() != self.inputs.len() {
            return Err(format!(
                "{} output files given for {} inputs.",
                self.outputs.len(),
                self.inputs.len()
            ));
        }
        let jobs = self
            .inputs
            .iter()
            .enumerate()
            .map(|(i, input)| Job {
                input: input.clone(),
                output: if self.default_output {
                    Some(default_output_path(input))
                } else {
                    self.outputs.get(i).cloned()
                },
            })
            .collect();
        Ok(Mode::Process { base, jobs })
    }

    /// Default log level implied by `-q`/`-v`; quiet wins.
    pub fn log_level(&self, configured: LogLevel) -> LogLevel {
        if self.quiet {
            LogLevel::Warn
        } else if self.verbose {
            LogLevel::Debug
        } else {
            configured
        }
    }

    /// Apply command line values over the loaded settings.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(rate) = self.sample_rate {
            settings.engine.working_sample_rate = rate;
        }
        if let Some(threads) = self.threads {
            settings.engine.thread_count = threads;
        }
        if let Some(quality) = self.quality {
            settings.engine.resample_quality = quality;
        }
        if self.send_messages {
            settings.logging.send_messages = true;
        }
        if let Some(tries) = self.num_tries {
            settings.noise_test.num_tries = tries;
        }
        if let Some(threshold) = self.test_threshold {
            settings.noise_test.threshold_secs = threshold;
        }
        if let Some(size) = self.test_track_size {
            settings.noise_test.track_secs = size;
        }
        if self.seed.is_some() {
            settings.noise_test.seed = self.seed;
        }
        settings.logging.level = self.log_level(settings.logging.level);
    }
}

/// `<input>.aligned.wav`, keeping the input's full name.
pub fn default_output_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(DEFAULT_OUTPUT_SUFFIX);
    PathBuf::from(name)
}

fn parse_positive_f64(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be a positive number, got {value}"))
    }
}

fn parse_threshold(s: &str) -> Result<f64, String> {
    let value = parse_positive_f64(s)?;
    if value <= 1e-6 {
        return Err(format!("threshold {value} is too small"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["track-align"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn process_with_explicit_outputs() {
        let cli = parse(&["-b", "base.wav", "-i", "a.wav", "b.wav", "-o", "a.out", "b.out"]);
        let Mode::Process { base, jobs } = cli.mode().unwrap() else {
            panic!("expected process mode");
        };
        assert_eq!(base, PathBuf::from("base.wav"));
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[1].output, Some(PathBuf::from("b.out")));
    }

    #[test]
    fn default_output_appends_suffix() {
        let cli = parse(&["-b", "base.wav", "-i", "dir/take.flac.wav", "-d"]);
        let Mode::Process { jobs, .. } = cli.mode().unwrap() else {
            panic!("expected process mode");
        };
        assert_eq!(
            jobs[0].output,
            Some(PathBuf::from("dir/take.flac.wav.aligned.wav"))
        );
    }

    #[test]
    fn messages_alone_count_as_output() {
        let cli = parse(&["-b", "base.wav", "-i", "a.wav", "-m"]);
        let Mode::Process { jobs, .. } = cli.mode().unwrap() else {
            panic!("expected process mode");
        };
        assert_eq!(jobs[0].output, None);
    }

    #[test]
    fn missing_pieces_are_reported() {
        assert!(parse(&["-i", "a.wav", "-d"]).mode().unwrap_err().contains("base"));
        assert!(parse(&["-b", "base.wav", "-i", "a.wav"])
            .mode()
            .unwrap_err()
            .contains("No output"));
        assert!(parse(&["-b", "base.wav", "-d"])
            .mode()
            .unwrap_err()
            .contains("No input"));
        assert!(parse(&["-b", "base.wav", "-i", "a.wav", "b.wav", "-o", "a.out"])
            .mode()
            .is_err());
    }

    #[test]
    fn output_and_default_output_conflict() {
        let result = Cli::try_parse_from(["track-align", "-b", "x", "-i", "a", "-o", "b", "-d"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_mode_wins_over_can_open() {
        let cli = parse(&["-b", "base.wav", "-t", "-c"]);
        assert_eq!(
            cli.mode().unwrap(),
            Mode::Test {
                base: PathBuf::from("base.wav")
            }
        );
        let cli = parse(&["-b", "base.wav", "-c"]);
        assert!(matches!(cli.mode().unwrap(), Mode::CanOpen { .. }));
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        for args in [
            ["-s", "0"],
            ["-s", "-16000"],
            ["--num-tries", "0"],
            ["--test-threshold", "0.0000001"],
            ["--test-track-size", "0"],
            ["-Q", "7"],
        ] {
            let mut argv = vec!["track-align", "-b", "base.wav", "-t"];
            argv.extend_from_slice(&args);
            assert!(Cli::try_parse_from(argv).is_err(), "{args:?}");
        }
    }

    #[test]
    fn overrides_replace_file_values() {
        let cli = parse(&[
            "-b", "base.wav", "-t", "-s", "8000", "-j", "4", "-Q", "sinc_best", "--num-tries", "7",
            "--seed", "11", "-v",
        ]);
        let mut settings = Settings::default();
        settings.engine.working_sample_rate = 22_050.0;
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.engine.working_sample_rate, 8_000.0);
        assert_eq!(settings.engine.thread_count, 4);
        assert_eq!(settings.engine.resample_quality, ResampleQuality::SincBest);
        assert_eq!(settings.noise_test.num_tries, 7);
        assert_eq!(settings.noise_test.seed, Some(11));
        assert_eq!(settings.noise_test.track_secs, 300.0);
        assert_eq!(settings.logging.level, LogLevel::Debug);
    }

    #[test]
    fn quiet_beats_verbose() {
        let cli = parse(&["-b", "base.wav", "-t", "-q", "-v"]);
        assert_eq!(cli.log_level(LogLevel::Info), LogLevel::Warn);
    }

    #[test]
    fn numeric_quality_is_accepted() {
        let cli = parse(&["-b", "base.wav", "-t", "-Q", "0"]);
        assert_eq!(cli.quality, Some(ResampleQuality::Nearest));
    }
}
