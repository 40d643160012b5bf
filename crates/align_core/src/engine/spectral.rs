//! Real-valued FFTs over power-of-two buffers.
//!
//! Plans come from a single process-wide planner that is created the first
//! time a session is built. Each `SpectralEngine` owns a worker pool sized
//! by the session's thread count; the pool runs paired transforms and the
//! element-wise spectrum work.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use realfft::num_complex::Complex32;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use super::types::{try_zeroed, EngineError, EngineResult};

static PLANNER: OnceLock<Mutex<RealFftPlanner<f32>>> = OnceLock::new();

/// Initialize the shared FFT planner. Cheap after the first call.
pub(crate) fn init_planner() -> &'static Mutex<RealFftPlanner<f32>> {
    PLANNER.get_or_init(|| {
        tracing::debug!("Initialized shared FFT planner");
        Mutex::new(RealFftPlanner::new())
    })
}

fn forward_plan(len: usize) -> Arc<dyn RealToComplex<f32>> {
    init_planner().lock().plan_fft_forward(len)
}

fn inverse_plan(len: usize) -> Arc<dyn ComplexToReal<f32>> {
    init_planner().lock().plan_fft_inverse(len)
}

/// Number of complex coefficients produced for a real buffer of `len`.
pub fn spectrum_len(len: usize) -> usize {
    len / 2 + 1
}

/// Copy `signal` into a zero-filled buffer of `len` samples.
///
/// Samples past `len` are dropped.
pub fn zero_padded(signal: &[f32], len: usize) -> EngineResult<Vec<f32>> {
    let mut padded = try_zeroed::<f32>(len)?;
    let n = signal.len().min(len);
    padded[..n].copy_from_slice(&signal[..n]);
    Ok(padded)
}

/// Forward/inverse real FFTs with a private worker pool.
pub struct SpectralEngine {
    pool: ThreadPool,
    thread_count: usize,
}

impl SpectralEngine {
    /// Create an engine with `thread_count` workers (at least one).
    pub fn new(thread_count: usize) -> EngineResult<Self> {
        let thread_count = thread_count.max(1);
        init_planner();
        let pool = ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("align-fft-{i}"))
            .build()
            .map_err(|e| EngineError::ThreadPool(e.to_string()))?;
        Ok(Self { pool, thread_count })
    }

    /// Worker pool shared with the other stages of a match.
    pub fn pool(&self) -> &ThreadPool {
        &self.pool
    }

    /// Number of workers.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Transform a real buffer of even length `N` into `N/2 + 1` coefficients.
    pub fn forward(&self, signal: &[f32]) -> EngineResult<Vec<Complex32>> {
        let len = signal.len();
        check_len(len)?;
        let plan = forward_plan(len);
        let mut input = try_zeroed::<f32>(len)?;
        input.copy_from_slice(signal);
        let mut output = try_zeroed::<Complex32>(spectrum_len(len))?;
        plan.process(&mut input, &mut output)
            .map_err(|e| EngineError::Transform(e.to_string()))?;
        Ok(output)
    }

    /// Inverse of [`forward`](Self::forward) for a buffer of length `len`.
    ///
    /// Unnormalized: `inverse(forward(x), N) == N * x`.
    pub fn inverse(&self, spectrum: &[Complex32], len: usize) -> EngineResult<Vec<f32>> {
        check_len(len)?;
        if spectrum.len() != spectrum_len(len) {
            return Err(EngineError::invalid(format!(
                "spectrum of {} bins does not match a transform of length {len}",
                spectrum.len()
            )));
        }
        let plan = inverse_plan(len);
        let mut input = try_zeroed::<Complex32>(spectrum.len())?;
        input.copy_from_slice(spectrum);
        // DC and Nyquist bins of a real signal carry no imaginary part.
        input[0].im = 0.0;
        let last = input.len() - 1;
        input[last].im = 0.0;
        let mut output = try_zeroed::<f32>(len)?;
        plan.process(&mut input, &mut output)
            .map_err(|e| EngineError::Transform(e.to_string()))?;
        Ok(output)
    }

    /// Forward-transform two buffers concurrently.
    pub fn forward_pair(
        &self,
        a: &[f32],
        b: &[f32],
    ) -> EngineResult<(Vec<Complex32>, Vec<Complex32>)> {
        let (fa, fb) = if self.thread_count > 1 {
            self.pool.join(|| self.forward(a), || self.forward(b))
        } else {
            (self.forward(a), self.forward(b))
        };
        Ok((fa?, fb?))
    }

    /// Replace `track` with `conj(track) * base`, bin by bin.
    pub fn cross_spectrum(&self, track: &mut [Complex32], base: &[Complex32]) {
        let product = |(t, b): (&mut Complex32, &Complex32)| *t = t.conj() * b;
        if self.thread_count > 1 {
            self.pool
                .install(|| track.par_iter_mut().zip(base.par_iter()).for_each(product));
        } else {
            track.iter_mut().zip(base.iter()).for_each(product);
        }
    }
}

impl std::fmt::Debug for SpectralEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralEngine")
            .field("thread_count", &self.thread_count)
            .finish()
    }
}

fn check_len(len: usize) -> EngineResult<()> {
    if len < 2 || len % 2 != 0 {
        return Err(EngineError::invalid(format!(
            "transform length must be even and at least 2, got {len}"
        )));
    }
    Ok(())
}
