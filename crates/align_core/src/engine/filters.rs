//! Spectral filters applied before correlation.
//!
//! A session keeps an ordered list of filters and runs every one of them,
//! in insertion order, over both the track and the base spectrum.

use realfft::num_complex::Complex32;

/// A transform applied in place to a half spectrum (`N/2 + 1` bins).
pub trait SpectralFilter: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Modify `spectrum` in place. Its length determines the bin spacing.
    fn apply(&self, spectrum: &mut [Complex32]);
}

/// Zeroes every bin outside `[low_hz, high_hz]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandLimit {
    /// Lowest frequency kept (Hz).
    pub low_hz: f64,
    /// Highest frequency kept (Hz).
    pub high_hz: f64,
    /// Rate of the signal the spectrum was taken from (the working rate).
    pub sample_rate: f64,
}

impl BandLimit {
    /// Create a band limit for spectra of signals sampled at `sample_rate`.
    pub fn new(low_hz: f64, high_hz: f64, sample_rate: f64) -> Self {
        Self {
            low_hz,
            high_hz,
            sample_rate,
        }
    }

    /// Speech band (300-3400 Hz).
    pub fn dialogue(sample_rate: f64) -> Self {
        Self::new(300.0, 3400.0, sample_rate)
    }

    /// Frequency of bin `k` in a half spectrum of `bins` coefficients.
    fn bin_frequency(&self, k: usize, bins: usize) -> f64 {
        let nyquist = self.sample_rate / 2.0;
        k as f64 * nyquist / (bins - 1) as f64
    }
}

impl SpectralFilter for BandLimit {
    fn name(&self) -> &str {
        "band-limit"
    }

    fn apply(&self, spectrum: &mut [Complex32]) {
        let bins = spectrum.len();
        if bins < 2 {
            return;
        }
        for (k, bin) in spectrum.iter_mut().enumerate() {
            let freq = self.bin_frequency(k, bins);
            if freq < self.low_hz || freq > self.high_hz {
                *bin = Complex32::new(0.0, 0.0);
            }
        }
    }
}

/// Whitens a spectrum to unit magnitude, keeping only phase.
///
/// Applied to both sides it turns the plain cross-correlation into a
/// phase correlation, which sharpens the peak for reverberant or
/// differently equalized recordings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseTransform {
    /// Bins with a magnitude below this are left untouched.
    pub floor: f32,
}

impl Default for PhaseTransform {
    fn default() -> Self {
        Self { floor: 1e-9 }
    }
}

impl SpectralFilter for PhaseTransform {
    fn name(&self) -> &str {
        "phase-transform"
    }

    fn apply(&self, spectrum: &mut [Complex32]) {
        for bin in spectrum.iter_mut() {
            let mag = bin.norm();
            if mag > self.floor {
                *bin /= mag;
            }
        }
    }
}

/// Run every filter over `spectrum`, in order.
pub fn apply_all(filters: &[Box<dyn SpectralFilter>], spectrum: &mut [Complex32]) {
    for filter in filters {
        filter.apply(spectrum);
    }
}
