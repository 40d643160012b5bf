//! FFT cross-correlation at the working rate.
//!
//! The track and the working-rate base are zero-padded to a common power of
//! two at least as long as both together, so the circular correlation holds
//! every linear lag without wraparound:
//!
//! ```text
//! index:  0 ........ B-1 | B ...... N-T | N-T+1 ...... N-1
//! lag:    0 ........ B-1 |   (unused)   | -(T-1) ...... -1
//! ```
//!
//! where `T` and `B` are the working-rate track and base lengths. Only the
//! two valid ranges are scanned for the peak.

use super::filters::{apply_all, SpectralFilter};
use super::resample::{resample, ResampleQuality};
use super::session::BaseSignal;
use super::spectral::{zero_padded, SpectralEngine};
use super::types::{EngineError, EngineResult, MatchResult};

/// Smallest power of two holding both signals end to end.
pub fn common_size(track_len: usize, base_len: usize) -> usize {
    (track_len + base_len).next_power_of_two().max(2)
}

/// Circular cross-correlation `c[k] = sum_n track[n] * base[n + k]`.
///
/// Both inputs are zero-padded to [`common_size`] and every filter is
/// applied to both spectra before they are multiplied.
pub fn cross_correlate(
    engine: &SpectralEngine,
    filters: &[Box<dyn SpectralFilter>],
    track: &[f32],
    base: &[f32],
) -> EngineResult<Vec<f32>> {
    let size = common_size(track.len(), base.len());
    let track_padded = zero_padded(track, size)?;
    let base_padded = zero_padded(base, size)?;

    let (mut track_spectrum, mut base_spectrum) =
        engine.forward_pair(&track_padded, &base_padded)?;
    drop(track_padded);
    drop(base_padded);

    if !filters.is_empty() {
        apply_all(filters, &mut track_spectrum);
        apply_all(filters, &mut base_spectrum);
    }

    engine.cross_spectrum(&mut track_spectrum, &base_spectrum);
    drop(base_spectrum);

    engine.inverse(&track_spectrum, size)
}

/// Signed lag of the correlation peak.
///
/// Scans the valid lag indices in ascending order; the first maximum wins.
/// Indices above `N - T` are negative lags and are unwrapped by subtracting
/// `N`. Returns `None` when no finite value exists.
pub fn peak_lag(correlation: &[f32], track_len: usize, base_len: usize) -> Option<i64> {
    let n = correlation.len();
    let positive_end = base_len.min(n);
    let negative_start = (n + 1).saturating_sub(track_len).max(positive_end);

    let mut best: Option<(usize, f32)> = None;
    let candidates = (0..positive_end).chain(negative_start..n);
    for idx in candidates {
        let value = correlation[idx];
        if !value.is_finite() {
            continue;
        }
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((idx, value)),
        }
    }

    best.map(|(idx, _)| {
        if idx >= negative_start {
            idx as i64 - n as i64
        } else {
            idx as i64
        }
    })
}

/// Coarse position of a normalized track within the base.
///
/// The offset is quantized to the working rate and still carries up to
/// `base_rate / working_rate` samples of error; see `refine`.
pub(crate) fn coarse_match(
    engine: &SpectralEngine,
    filters: &[Box<dyn SpectralFilter>],
    base: &BaseSignal,
    working_rate: f64,
    quality: ResampleQuality,
    track: &[f32],
    track_rate: f64,
) -> EngineResult<MatchResult> {
    let ratio = working_rate / track_rate;
    let resampled;
    let track_working: &[f32] = if ratio != 1.0 {
        resampled = resample(track, ratio, quality)?;
        &resampled
    } else {
        track
    };
    if track_working.is_empty() {
        return Err(EngineError::invalid(format!(
            "track of {} samples is empty at the working rate",
            track.len()
        )));
    }

    let correlation = cross_correlate(engine, filters, track_working, &base.working)?;
    let lag = peak_lag(&correlation, track_working.len(), base.working.len())
        .ok_or_else(|| EngineError::Transform("correlation has no finite peak".to_string()))?;

    let offset = (lag as f64 * base.sample_rate / working_rate).round() as i64;
    let length = (track.len() as f64 * base.sample_rate / track_rate).round() as u64;

    tracing::debug!(
        track_working_len = track_working.len(),
        base_working_len = base.working.len(),
        common_size = correlation.len(),
        lag,
        offset,
        length,
        "Coarse match"
    );

    Ok(MatchResult::new(offset, length))
}
