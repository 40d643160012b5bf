//! WAV input and output around the engine.
//!
//! Decoding mixes every file down to mono `f32`; extraction copies a window
//! of the base file, in the base's own format, padding with silence where
//! the window runs outside it.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;

/// Errors from reading or writing audio files.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported WAV layout: {0}")]
    Unsupported(String),
}

/// Result type for audio operations.
pub type AudioResult<T> = Result<T, AudioError>;

/// A decoded file mixed down to mono.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// One sample per frame, the average of all channels.
    pub samples: Vec<f32>,
    /// Frames per second.
    pub sample_rate: u32,
    /// Channel count of the source file.
    pub channels: u16,
    /// Number of frames.
    pub frames: u64,
}

impl DecodedAudio {
    /// Length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// Read the header of a WAV file without decoding it.
pub fn probe_wav(path: impl AsRef<Path>) -> AudioResult<WavSpec> {
    let reader = WavReader::open(path.as_ref())?;
    Ok(reader.spec())
}

/// Decode a WAV file to mono `f32`.
///
/// Integer PCM is scaled to `[-1, 1)`; float PCM is passed through.
pub fn decode_wav(path: impl AsRef<Path>) -> AudioResult<DecodedAudio> {
    let path = path.as_ref();
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::Unsupported("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| (v as f64 * scale) as f32))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let channels = spec.channels as usize;
    let samples: Vec<f32> = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        frames = samples.len(),
        "Decoded WAV"
    );

    Ok(DecodedAudio {
        frames: samples.len() as u64,
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}

/// Write `length` frames of the base file starting at frame `offset` to
/// `out_path`, in the base's format.
///
/// Frames before the start or past the end of the base are written as
/// silence. Returns how many frames came from the base.
pub fn extract_segment(
    base_path: impl AsRef<Path>,
    offset: i64,
    length: u64,
    out_path: impl AsRef<Path>,
) -> AudioResult<u64> {
    let mut reader = WavReader::open(base_path.as_ref())?;
    let spec = reader.spec();
    let channels = spec.channels as u64;
    let total = reader.duration() as u64;

    let lead = if offset < 0 {
        offset.unsigned_abs().min(length)
    } else {
        0
    };
    let start = offset.max(0) as u64;
    let copied = (length - lead).min(total.saturating_sub(start));
    let tail = length - lead - copied;

    let mut writer = WavWriter::create(out_path.as_ref(), spec)?;
    write_silence(&mut writer, spec, lead * channels)?;

    if copied > 0 {
        let start_frame = u32::try_from(start)
            .map_err(|_| AudioError::Unsupported(format!("offset {start} out of range")))?;
        reader.seek(start_frame)?;
        let count = (copied * channels) as usize;
        match spec.sample_format {
            SampleFormat::Float => {
                for sample in reader.samples::<f32>().take(count) {
                    writer.write_sample(sample?)?;
                }
            }
            SampleFormat::Int => {
                for sample in reader.samples::<i32>().take(count) {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }

    write_silence(&mut writer, spec, tail * channels)?;
    writer.finalize()?;

    tracing::debug!(
        out = %out_path.as_ref().display(),
        offset,
        length,
        lead,
        copied,
        tail,
        "Extracted segment"
    );
    Ok(copied)
}

fn write_silence(
    writer: &mut WavWriter<BufWriter<File>>,
    spec: WavSpec,
    samples: u64,
) -> AudioResult<()> {
    for _ in 0..samples {
        match spec.sample_format {
            SampleFormat::Float => writer.write_sample(0.0f32)?,
            SampleFormat::Int => writer.write_sample(0i32)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn int_spec(channels: u16) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn write_i16(path: &Path, spec: WavSpec, samples: &[i16]) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn read_i16(path: &Path) -> Vec<i16> {
        WavReader::open(path)
            .unwrap()
            .into_samples::<i16>()
            .map(|s| s.unwrap())
            .collect()
    }

    #[test]
    fn decode_scales_and_mixes_down() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_i16(&path, int_spec(2), &[16_384, 0, -32_768, -32_768, 8_192, 8_192]);

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.channels, 2);
        assert_eq!(audio.frames, 3);
        assert_eq!(audio.sample_rate, 8_000);
        assert_eq!(audio.samples, vec![0.25, -1.0, 0.25]);
    }

    #[test]
    fn decode_passes_float_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.5f32, -0.125, 1.5] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let audio = decode_wav(&path).unwrap();
        assert_eq!(audio.samples, vec![0.5, -0.125, 1.5]);
        assert!((audio.duration_secs() - 3.0 / 44_100.0).abs() < 1e-12);
    }

    #[test]
    fn decode_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(decode_wav(dir.path().join("nope.wav")).is_err());
        assert!(probe_wav(dir.path().join("nope.wav")).is_err());
    }

    #[test]
    fn extract_inside_base() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.wav");
        let out = dir.path().join("out.wav");
        let samples: Vec<i16> = (1..=10).collect();
        write_i16(&base, int_spec(1), &samples);

        let copied = extract_segment(&base, 3, 4, &out).unwrap();
        assert_eq!(copied, 4);
        assert_eq!(read_i16(&out), vec![4, 5, 6, 7]);
        assert_eq!(probe_wav(&out).unwrap(), int_spec(1));
    }

    #[test]
    fn extract_pads_both_ends_with_silence() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.wav");
        let out = dir.path().join("out.wav");
        // Two channels, three frames.
        write_i16(&base, int_spec(2), &[1, -1, 2, -2, 3, -3]);

        let copied = extract_segment(&base, -2, 7, &out).unwrap();
        assert_eq!(copied, 3);
        assert_eq!(
            read_i16(&out),
            vec![0, 0, 0, 0, 1, -1, 2, -2, 3, -3, 0, 0, 0, 0]
        );
    }

    #[test]
    fn extract_entirely_outside_is_silent() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("base.wav");
        let out = dir.path().join("out.wav");
        write_i16(&base, int_spec(1), &[5, 6, 7]);

        assert_eq!(extract_segment(&base, 10, 3, &out).unwrap(), 0);
        assert_eq!(read_i16(&out), vec![0, 0, 0]);
        assert_eq!(extract_segment(&base, -10, 4, &out).unwrap(), 0);
        assert_eq!(read_i16(&out), vec![0, 0, 0, 0]);
    }
}
