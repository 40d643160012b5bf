//! Sample rate conversion backed by rubato.
//!
//! rubato emits output frame `j` at source position `(j + 1) / ratio - lead`,
//! where `lead` depends on the interpolator. The output is shifted by the
//! nearest whole frame so that sample `i` of the result lines up with
//! source position `i / ratio` to within half an output sample.

use std::str::FromStr;

use rubato::{
    FastFixedIn, PolynomialDegree, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};

use super::types::{try_with_capacity, EngineError, EngineResult};

/// Input frames fed to the resampler per call.
const CHUNK_SIZE: usize = 1024;

/// Resampling algorithm, from cheapest to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleQuality {
    /// Zero-order hold.
    Nearest,
    /// Linear interpolation.
    Linear,
    /// Short windowed sinc.
    #[default]
    SincFastest,
    /// Medium windowed sinc.
    SincMedium,
    /// Long windowed sinc with cubic kernel interpolation.
    SincBest,
}

impl ResampleQuality {
    /// Resolve a numeric quality (0 = nearest ... 4 = best sinc).
    pub fn from_raw(raw: i32) -> EngineResult<Self> {
        match raw {
            0 => Ok(ResampleQuality::Nearest),
            1 => Ok(ResampleQuality::Linear),
            2 => Ok(ResampleQuality::SincFastest),
            3 => Ok(ResampleQuality::SincMedium),
            4 => Ok(ResampleQuality::SincBest),
            _ => Err(EngineError::invalid(format!(
                "resample quality must be within 0..=4, got {raw}"
            ))),
        }
    }

    /// Numeric value of this quality.
    pub fn as_raw(&self) -> i32 {
        match self {
            ResampleQuality::Nearest => 0,
            ResampleQuality::Linear => 1,
            ResampleQuality::SincFastest => 2,
            ResampleQuality::SincMedium => 3,
            ResampleQuality::SincBest => 4,
        }
    }

    /// Source samples by which rubato's first output frame trails
    /// `1 / ratio`: half the polynomial window for the fast interpolators,
    /// one sample for the sinc kernels.
    fn lead_in(&self) -> f64 {
        match self {
            ResampleQuality::Nearest | ResampleQuality::Linear => 4.0,
            ResampleQuality::SincFastest
            | ResampleQuality::SincMedium
            | ResampleQuality::SincBest => 1.0,
        }
    }

    fn sinc_parameters(&self) -> Option<SincInterpolationParameters> {
        let (sinc_len, f_cutoff, oversampling_factor, interpolation, window) = match self {
            ResampleQuality::Nearest | ResampleQuality::Linear => return None,
            ResampleQuality::SincFastest => (
                64,
                0.91,
                128,
                SincInterpolationType::Linear,
                WindowFunction::Hann2,
            ),
            ResampleQuality::SincMedium => (
                128,
                0.925,
                256,
                SincInterpolationType::Linear,
                WindowFunction::Blackman2,
            ),
            ResampleQuality::SincBest => (
                256,
                0.95,
                256,
                SincInterpolationType::Cubic,
                WindowFunction::BlackmanHarris2,
            ),
        };
        Some(SincInterpolationParameters {
            sinc_len,
            f_cutoff,
            interpolation,
            oversampling_factor,
            window,
        })
    }
}

impl FromStr for ResampleQuality {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(raw) = s.parse::<i32>() {
            return Self::from_raw(raw);
        }
        match s.to_lowercase().replace('-', "_").as_str() {
            "nearest" | "zero_order_hold" => Ok(ResampleQuality::Nearest),
            "linear" => Ok(ResampleQuality::Linear),
            "sinc_fastest" | "fastest" => Ok(ResampleQuality::SincFastest),
            "sinc_medium" | "medium" => Ok(ResampleQuality::SincMedium),
            "sinc_best" | "best" => Ok(ResampleQuality::SincBest),
            other => Err(EngineError::invalid(format!("unknown resample quality '{other}'"))),
        }
    }
}

/// Output length requested for `input_len` samples at `ratio` (target/source).
pub fn requested_len(input_len: usize, ratio: f64) -> usize {
    (input_len as f64 * ratio).round().max(0.0) as usize
}

/// Resample `input` by `ratio` (target rate / source rate).
///
/// Returns at most `round(input.len() * ratio)` samples; the caller must use
/// the returned length, which can fall short of the request.
pub fn resample(input: &[f32], ratio: f64, quality: ResampleQuality) -> EngineResult<Vec<f32>> {
    if !(ratio.is_finite() && ratio > 0.0) {
        return Err(EngineError::invalid(format!("invalid resample ratio {ratio}")));
    }
    let requested = requested_len(input.len(), ratio);
    if ratio == 1.0 {
        let mut out = try_with_capacity(input.len())?;
        out.extend_from_slice(input);
        return Ok(out);
    }
    if input.is_empty() || requested == 0 {
        return Ok(Vec::new());
    }

    let out = match quality.sinc_parameters() {
        Some(params) => {
            let resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, CHUNK_SIZE, 1)
                .map_err(|e| EngineError::Resampler(e.to_string()))?;
            drive(resampler, input, requested, ratio, quality.lead_in())?
        }
        None => {
            let degree = if quality == ResampleQuality::Nearest {
                PolynomialDegree::Nearest
            } else {
                PolynomialDegree::Linear
            };
            let resampler = FastFixedIn::<f32>::new(ratio, 1.0, degree, CHUNK_SIZE, 1)
                .map_err(|e| EngineError::Resampler(e.to_string()))?;
            drive(resampler, input, requested, ratio, quality.lead_in())?
        }
    };

    tracing::trace!(
        input_len = input.len(),
        requested,
        generated = out.len(),
        ratio,
        ?quality,
        "Resampled signal"
    );
    Ok(out)
}

/// Output frames to drop from the front (positive) or pad with silence
/// (negative) so that frame `i` sits at source position `i / ratio`.
fn alignment_shift(ratio: f64, lead_in: f64) -> i64 {
    (lead_in * ratio - 1.0).round() as i64
}

/// Feed `input` through `resampler`, flush it, and align its output.
fn drive<R: Resampler<f32>>(
    mut resampler: R,
    input: &[f32],
    requested: usize,
    ratio: f64,
    lead_in: f64,
) -> EngineResult<Vec<f32>> {
    let shift = alignment_shift(ratio, lead_in);
    let skip = shift.max(0) as usize;
    let pad = (-shift).max(0) as usize;
    let wanted = requested + skip;
    let mut out = try_with_capacity::<f32>(wanted + (CHUNK_SIZE as f64 * ratio) as usize + 1)?;
    out.resize(pad, 0.0);

    let mut pos = 0;
    while pos < input.len() {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(input.len());
        let block = &input[pos..end];
        let produced = if block.len() == needed {
            resampler.process(&[block][..], None)
        } else {
            resampler.process_partial(Some(&[block][..]), None)
        }
        .map_err(|e| EngineError::Resampler(e.to_string()))?;
        out.extend_from_slice(&produced[0]);
        pos = end;
    }

    // Push zeros through until the delayed tail has come out.
    let per_flush = ((CHUNK_SIZE as f64 * ratio) as usize).max(1);
    let max_flushes = wanted / per_flush + 2;
    let mut flushes = 0;
    while out.len() < wanted && flushes < max_flushes {
        let produced = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| EngineError::Resampler(e.to_string()))?;
        if produced[0].is_empty() {
            break;
        }
        out.extend_from_slice(&produced[0]);
        flushes += 1;
    }

    out.drain(..skip.min(out.len()));
    out.truncate(requested);
    Ok(out)
}
