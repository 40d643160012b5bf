//! Run modes: batch matching, base probing and the noise test.

use std::path::Path;

use align_core::audio::{decode_wav, extract_segment, probe_wav};
use align_core::config::Settings;
use align_core::engine::{MatchResult, SampleBuffer, Session};
use align_core::harness::{CriticalNoise, NoiseTester};
use align_core::logging::{StatusEmitter, StatusEvent};
use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::Job;

/// Where one track was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackReport {
    pub file: String,
    /// Start in base samples; negative when the track starts before the base.
    pub offset: i64,
    /// Length in base samples.
    pub length: u64,
    pub offset_secs: f64,
    pub length_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Totals of a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub matched: usize,
    pub failed: usize,
}

/// Locate every job's input in `base`, writing segments where requested.
///
/// A track that cannot be read, matched or written out is reported and
/// skipped. Failing to load the base aborts the batch.
pub fn process(
    base: &Path,
    jobs: &[Job],
    settings: &Settings,
    status: &StatusEmitter,
    mut on_track: impl FnMut(&TrackReport),
) -> Result<BatchSummary> {
    let base_audio =
        decode_wav(base).with_context(|| format!("Failed to read base {}", base.display()))?;
    let base_rate = base_audio.sample_rate as f64;

    let mut session = Session::from_settings(&settings.engine)?;
    session
        .set_base(SampleBuffer::Float32(&base_audio.samples), base_rate)
        .with_context(|| format!("Failed to set base {}", base.display()))?;
    drop(base_audio);
    status.emit_file(StatusEvent::BaseRead, &base.display().to_string());

    let mut summary = BatchSummary::default();
    for job in jobs {
        let file = job.input.display().to_string();
        let result = match place(&session, base, job, status) {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(file = %file, "Error mapping track to base: {e:#}");
                eprintln!("ERROR: {file}: {e:#}");
                summary.failed += 1;
                continue;
            }
        };

        on_track(&TrackReport {
            file,
            offset: result.offset,
            length: result.length,
            offset_secs: result.offset_secs(base_rate),
            length_secs: result.length_secs(base_rate),
            output: job.output.as_ref().map(|p| p.display().to_string()),
        });
        summary.matched += 1;
        status.emit(StatusEvent::Done, &[]);
    }

    tracing::info!(
        matched = summary.matched,
        failed = summary.failed,
        "Batch finished"
    );
    Ok(summary)
}

/// Locate one job's track and write its segment of the base.
fn place(
    session: &Session,
    base: &Path,
    job: &Job,
    status: &StatusEmitter,
) -> Result<MatchResult> {
    let file = job.input.display().to_string();
    let track = decode_wav(&job.input).context("Failed to read track")?;
    status.emit_file(StatusEvent::TrackRead, &file);
    let result = session.match_track(
        SampleBuffer::Float32(&track.samples),
        track.sample_rate as f64,
    )?;
    status.track_position(&file, result.offset, result.length);

    if let Some(out) = &job.output {
        extract_segment(base, result.offset, result.length, out)
            .with_context(|| format!("Failed to write {}", out.display()))?;
        status.emit_file(StatusEvent::WroteFile, &out.display().to_string());
    }
    Ok(result)
}

/// Report whether `base` opens as a WAV file.
pub fn can_open(base: &Path, status: &StatusEmitter) -> bool {
    let file = base.display().to_string();
    match probe_wav(base) {
        Ok(spec) => {
            tracing::debug!(
                file = %file,
                sample_rate = spec.sample_rate,
                channels = spec.channels,
                "Base can be opened"
            );
            status.emit_file(StatusEvent::CanOpenFile, &file);
            true
        }
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "Base cannot be opened");
            status.emit_file(StatusEvent::CannotOpenFile, &file);
            false
        }
    }
}

/// Run the critical-noise search on `base`.
pub fn noise_test(base: &Path, settings: &Settings) -> Result<CriticalNoise> {
    let audio =
        decode_wav(base).with_context(|| format!("Failed to read base {}", base.display()))?;
    let mut tester = NoiseTester::new(
        &settings.engine,
        &settings.noise_test,
        &audio.samples,
        audio.sample_rate as f64,
    )?;
    Ok(tester.critical_noise()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::path::PathBuf;
    use tempfile::tempdir;

    const RATE: u32 = 8_000;

    fn write_wav(path: &Path, samples: &[i16]) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn noise(len: usize, seed: u64) -> Vec<i16> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(-12_000..12_000)).collect()
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.engine.working_sample_rate = RATE as f64;
        settings
    }

    #[test]
    fn batch_locates_tracks_and_writes_segments() {
        let dir = tempdir().unwrap();
        let base_path = dir.path().join("base.wav");
        let base = noise(24_000, 1);
        write_wav(&base_path, &base);

        let track_path = dir.path().join("take.wav");
        write_wav(&track_path, &base[6_000..10_000]);
        let missing = dir.path().join("missing.wav");
        let out_path = dir.path().join("take.out.wav");

        let jobs = vec![
            Job {
                input: missing,
                output: None,
            },
            Job {
                input: track_path,
                output: Some(out_path.clone()),
            },
        ];
        let mut reports = Vec::new();
        let summary = process(
            &base_path,
            &jobs,
            &settings(),
            &StatusEmitter::disabled(),
            |r| reports.push(r.clone()),
        )
        .unwrap();

        assert_eq!(summary, BatchSummary { matched: 1, failed: 1 });
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].offset, 6_000);
        assert_eq!(reports[0].length, 4_000);
        assert!((reports[0].offset_secs - 0.75).abs() < 1e-9);

        let written: Vec<i16> = hound::WavReader::open(&out_path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect();
        assert_eq!(written, base[6_000..10_000].to_vec());
    }

    #[test]
    fn unwritable_segment_skips_only_that_track() {
        let dir = tempdir().unwrap();
        let base_path = dir.path().join("base.wav");
        let base = noise(24_000, 2);
        write_wav(&base_path, &base);

        let first = dir.path().join("first.wav");
        write_wav(&first, &base[2_000..5_000]);
        let second = dir.path().join("second.wav");
        write_wav(&second, &base[12_000..15_000]);
        let good_out = dir.path().join("second.out.wav");

        let jobs = vec![
            Job {
                input: first,
                output: Some(dir.path().join("no_such_dir").join("first.out.wav")),
            },
            Job {
                input: second,
                output: Some(good_out.clone()),
            },
        ];
        let mut reports = Vec::new();
        let summary = process(
            &base_path,
            &jobs,
            &settings(),
            &StatusEmitter::disabled(),
            |r| reports.push(r.clone()),
        )
        .unwrap();

        assert_eq!(summary, BatchSummary { matched: 1, failed: 1 });
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].offset, 12_000);
        assert!(good_out.is_file());
    }

    #[test]
    fn unreadable_base_aborts() {
        let dir = tempdir().unwrap();
        let jobs = vec![Job {
            input: PathBuf::from("a.wav"),
            output: None,
        }];
        let err = process(
            &dir.path().join("nope.wav"),
            &jobs,
            &settings(),
            &StatusEmitter::disabled(),
            |_| {},
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read base"));
    }

    #[test]
    fn can_open_checks_the_header() {
        let dir = tempdir().unwrap();
        let good = dir.path().join("good.wav");
        write_wav(&good, &[0, 1, 2]);
        let bad = dir.path().join("bad.wav");
        std::fs::write(&bad, b"not a wav file").unwrap();

        let status = StatusEmitter::disabled();
        assert!(can_open(&good, &status));
        assert!(!can_open(&bad, &status));
        assert!(!can_open(&dir.path().join("missing.wav"), &status));
    }

    #[test]
    fn report_serializes_without_empty_output() {
        let report = TrackReport {
            file: "a.wav".to_string(),
            offset: -80,
            length: 800,
            offset_secs: -0.01,
            length_secs: 0.1,
            output: None,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"offset\":-80"));
        assert!(!json.contains("output"));
    }
}
