//! Zero-mean / unit-variance normalization.

use rayon::prelude::*;
use rayon::ThreadPool;

/// Below this many samples the parallel reduction is not worth dispatching.
const PARALLEL_THRESHOLD: usize = 1 << 16;

/// Normalize `samples` in place to zero mean and unit variance.
///
/// Mean and population variance come from a single pass
/// (`var = E[x²] - E[x]²`) accumulated in `f64`. A signal whose variance is
/// numerically zero only has its mean removed. With a pool, the sums are
/// reduced across its workers; the reduction order can shift the result by
/// a few ULPs between thread counts.
pub fn normalize(samples: &mut [f32], pool: Option<&ThreadPool>) {
    if samples.is_empty() {
        return;
    }

    let (sum, sum_sq) = match pool {
        Some(pool) if samples.len() >= PARALLEL_THRESHOLD => pool.install(|| {
            samples
                .par_iter()
                .map(|&x| {
                    let x = x as f64;
                    (x, x * x)
                })
                .reduce(|| (0.0, 0.0), |a, b| (a.0 + b.0, a.1 + b.1))
        }),
        _ => samples.iter().fold((0.0f64, 0.0f64), |(s, sq), &x| {
            let x = x as f64;
            (s + x, sq + x * x)
        }),
    };

    let n = samples.len() as f64;
    let mean = sum / n;
    let mean_sq = sum_sq / n;
    let var = mean_sq - mean * mean;

    // Constant signals leave rounding residue relative to E[x²].
    if var <= mean_sq * 1e-12 || var <= 0.0 {
        let mean = mean as f32;
        apply(samples, pool, |x| x - mean);
    } else {
        let mean = mean as f32;
        let inv_std = (1.0 / var.sqrt()) as f32;
        apply(samples, pool, |x| (x - mean) * inv_std);
    }
}

fn apply<F>(samples: &mut [f32], pool: Option<&ThreadPool>, f: F)
where
    F: Fn(f32) -> f32 + Sync + Send,
{
    match pool {
        Some(pool) if samples.len() >= PARALLEL_THRESHOLD => {
            pool.install(|| samples.par_iter_mut().for_each(|x| *x = f(*x)))
        }
        _ => samples.iter_mut().for_each(|x| *x = f(*x)),
    }
}

/// Mean and population variance of `samples`, for diagnostics and tests.
pub fn moments(samples: &[f32]) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| {
            let d = x as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var)
}
