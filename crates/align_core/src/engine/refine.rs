//! Full-rate refinement of a coarse offset.
//!
//! Working at a reduced rate leaves up to `ceil(base_rate / working_rate)`
//! base samples of uncertainty. The refiner resamples the track to the base
//! rate and tries every shift in that radius with a direct dot product
//! against the full-rate base.

use rayon::prelude::*;
use rayon::ThreadPool;

use super::resample::{resample, ResampleQuality};
use super::session::BaseSignal;
use super::types::EngineResult;

/// Search radius in base samples; `0` or `1` means nothing to refine.
pub fn refinement_radius(base_rate: f64, working_rate: f64) -> usize {
    (base_rate / working_rate).ceil().max(0.0) as usize
}

/// Pick the shift in `[-radius, radius]` that best aligns `track` with `base`
/// around `offset`, returning the corrected offset.
///
/// Only base samples at least `radius` away from both edges of the overlap
/// take part, so every shifted track index stays in bounds. Returns `None`
/// when that region is empty.
pub fn refine_offset(
    pool: Option<&ThreadPool>,
    base: &[f32],
    track: &[f32],
    offset: i64,
    radius: usize,
) -> Option<i64> {
    let r = radius as i64;
    let overlap_in = offset.max(0);
    let overlap_out = (offset + track.len() as i64).min(base.len() as i64);
    let lo = overlap_in + r;
    let hi = overlap_out - r;
    if lo >= hi {
        return None;
    }

    let dot = |shift: i64| -> f64 {
        let start = (lo - offset + shift) as usize;
        let end = (hi - offset + shift) as usize;
        base[lo as usize..hi as usize]
            .iter()
            .zip(&track[start..end])
            .map(|(&a, &b)| a as f64 * b as f64)
            .sum()
    };

    let scores: Vec<f64> = match pool {
        Some(pool) => pool.install(|| (-r..=r).into_par_iter().map(dot).collect()),
        None => (-r..=r).map(dot).collect(),
    };

    let mut best = 0usize;
    for (i, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = i;
        }
    }
    let shift = best as i64 - r;
    Some(offset - shift)
}

/// Refine `coarse_offset` for a normalized track sampled at `track_rate`.
///
/// A no-op when the working rate is at least the base rate, or when the
/// track does not overlap the base far enough to compare.
pub(crate) fn refine(
    pool: Option<&ThreadPool>,
    base: &BaseSignal,
    working_rate: f64,
    quality: ResampleQuality,
    track: &[f32],
    track_rate: f64,
    coarse_offset: i64,
) -> EngineResult<i64> {
    let radius = refinement_radius(base.sample_rate, working_rate);
    if radius <= 1 {
        return Ok(coarse_offset);
    }

    let ratio = base.sample_rate / track_rate;
    let resampled;
    let track_full: &[f32] = if ratio != 1.0 {
        resampled = resample(track, ratio, quality)?;
        &resampled
    } else {
        track
    };

    match refine_offset(pool, &base.full, track_full, coarse_offset, radius) {
        Some(offset) => {
            tracing::debug!(coarse_offset, offset, radius, "Refined offset");
            Ok(offset)
        }
        None => {
            tracing::warn!(
                coarse_offset,
                radius,
                track_len = track_full.len(),
                base_len = base.full.len(),
                "Overlap too small to refine, keeping coarse offset"
            );
            Ok(coarse_offset)
        }
    }
}
