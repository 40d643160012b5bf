//! Critical-noise test: how much Gaussian noise can a track take before
//! the engine stops finding it?
//!
//! Each trial cuts a random window out of the base, adds noise of standard
//! deviation `sigma`, and matches it back. A `sigma` passes when a majority
//! of trials land within the threshold. The search grows `sigma` in steps
//! of [`GROWTH_STEP`] until a level fails, then bisects the last interval
//! down to [`BISECT_WIDTH`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::config::{EngineSettings, NoiseTestSettings};
use crate::engine::{EngineError, SampleBuffer, Session};

/// Increment of `sigma` while looking for the first failing level.
pub const GROWTH_STEP: f64 = 100.0;

/// Width of the bracketing interval at which the bisection stops.
pub const BISECT_WIDTH: f64 = 0.01;

/// Upper bound on growth steps; reached only when nothing ever fails.
pub const MAX_GROWTH_STEPS: u32 = 1_000;

/// Errors from the noise harness.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("test track of {track} samples does not fit in a base of {base} samples")]
    TrackTooLong { track: usize, base: usize },

    #[error("invalid noise test settings: {0}")]
    InvalidSettings(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Outcome of a critical-noise search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalNoise {
    /// Largest noise deviation that still matched reliably.
    pub sigma: f64,
    /// `10 * ln(1 / sigma^2)`, the figure reported alongside `sigma`.
    pub db: f64,
    /// Total number of matches performed.
    pub trials: u32,
    /// True when the growth phase hit [`MAX_GROWTH_STEPS`] without failing.
    pub saturated: bool,
}

impl CriticalNoise {
    fn new(sigma: f64, trials: u32, saturated: bool) -> Self {
        Self {
            sigma,
            db: 10.0 * (1.0 / (sigma * sigma)).ln(),
            trials,
            saturated,
        }
    }
}

/// Runs noise trials against one base signal.
pub struct NoiseTester<'a> {
    session: Session,
    base: &'a [f32],
    sample_rate: f64,
    track_len: usize,
    num_tries: u32,
    threshold_samples: f64,
    rng: StdRng,
    trials: u32,
}

impl<'a> NoiseTester<'a> {
    /// Build a session for `base` (recorded at `sample_rate`) and prepare
    /// trials of `settings.track_secs` seconds.
    pub fn new(
        engine: &EngineSettings,
        settings: &NoiseTestSettings,
        base: &'a [f32],
        sample_rate: f64,
    ) -> HarnessResult<Self> {
        if settings.num_tries == 0 {
            return Err(HarnessError::InvalidSettings(
                "num_tries must be at least 1".to_string(),
            ));
        }
        if !(settings.track_secs > 0.0 && settings.threshold_secs > 0.0) {
            return Err(HarnessError::InvalidSettings(format!(
                "track_secs ({}) and threshold_secs ({}) must be positive",
                settings.track_secs, settings.threshold_secs
            )));
        }

        let track_len = (settings.track_secs * sample_rate).ceil() as usize;
        if track_len >= base.len() {
            return Err(HarnessError::TrackTooLong {
                track: track_len,
                base: base.len(),
            });
        }

        let mut session = Session::from_settings(engine)?;
        session.set_base(SampleBuffer::Float32(base), sample_rate)?;

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Ok(Self {
            session,
            base,
            sample_rate,
            track_len,
            num_tries: settings.num_tries,
            threshold_samples: settings.threshold_secs * sample_rate,
            rng,
            trials: 0,
        })
    }

    /// Samples per trial track.
    pub fn track_len(&self) -> usize {
        self.track_len
    }

    /// Matches performed so far.
    pub fn trials(&self) -> u32 {
        self.trials
    }

    /// One trial at `sigma`: true when the match lands within the threshold.
    pub fn trial(&mut self, sigma: f64) -> HarnessResult<bool> {
        let max_start = self.base.len() - self.track_len - 1;
        let real_in = self.rng.random_range(0..=max_start);

        let mut track = self.base[real_in..real_in + self.track_len].to_vec();
        for sample in track.iter_mut() {
            *sample += (gaussian(&mut self.rng) * sigma) as f32;
        }

        let result = self
            .session
            .match_track(SampleBuffer::Float32(&track), self.sample_rate)?;
        self.trials += 1;

        let error = (result.offset - real_in as i64).abs() as f64;
        let ok = error < self.threshold_samples;
        tracing::debug!(sigma, real_in, found = result.offset, ok, "Noise trial");
        Ok(ok)
    }

    /// Whether a majority of `num_tries` trials at `sigma` succeed.
    ///
    /// Stops as soon as the outcome is decided.
    pub fn passes(&mut self, sigma: f64) -> HarnessResult<bool> {
        let majority = self.num_tries / 2;
        let mut succeeded = 0;
        let mut failed = 0;
        for _ in 0..self.num_tries {
            if self.trial(sigma)? {
                succeeded += 1;
            } else {
                failed += 1;
            }
            if failed > majority {
                tracing::info!(sigma, succeeded, failed, "Noise level failed");
                return Ok(false);
            }
            if succeeded > majority {
                break;
            }
        }
        tracing::info!(sigma, succeeded, failed, "Noise level passed");
        Ok(true)
    }

    /// Search for the critical noise deviation.
    pub fn critical_noise(&mut self) -> HarnessResult<CriticalNoise> {
        let mut low = 0.0;
        let mut high = GROWTH_STEP;
        let mut steps = 0;
        while self.passes(high)? {
            steps += 1;
            if steps >= MAX_GROWTH_STEPS {
                tracing::warn!(sigma = high, "No failing noise level found");
                return Ok(CriticalNoise::new(high, self.trials, true));
            }
            low = high;
            high += GROWTH_STEP;
        }

        while high - low > BISECT_WIDTH {
            let mid = (low + high) / 2.0;
            if self.passes(mid)? {
                low = mid;
            } else {
                high = mid;
            }
        }

        let result = CriticalNoise::new((low + high) / 2.0, self.trials, false);
        tracing::info!(
            sigma = result.sigma,
            db = result.db,
            trials = result.trials,
            "Critical noise found"
        );
        Ok(result)
    }
}

/// Standard normal sample (Box-Muller).
fn gaussian(rng: &mut StdRng) -> f64 {
    // 1 - [0, 1) keeps the logarithm finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_signal(len: usize, seed: u64) -> Vec<f32> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    fn engine() -> EngineSettings {
        EngineSettings {
            working_sample_rate: 8_000.0,
            thread_count: 1,
            ..EngineSettings::default()
        }
    }

    fn settings(seed: u64) -> NoiseTestSettings {
        NoiseTestSettings {
            num_tries: 5,
            threshold_secs: 0.01,
            track_secs: 0.25,
            seed: Some(seed),
        }
    }

    #[test]
    fn gaussian_has_unit_variance() {
        let mut rng = StdRng::seed_from_u64(3);
        let n = 50_000;
        let samples: Vec<f64> = (0..n).map(|_| gaussian(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");
        assert!((var - 1.0).abs() < 0.03, "var {var}");
    }

    #[test]
    fn track_longer_than_base_is_rejected() {
        let base = base_signal(1_000, 1);
        // 0.25 s at 2 kHz fits; at 8 kHz it does not.
        assert!(NoiseTester::new(&engine(), &settings(1), &base, 2_000.0).is_ok());
        let err = NoiseTester::new(&engine(), &settings(1), &base, 8_000.0).err();
        assert!(matches!(err, Some(HarnessError::TrackTooLong { track: 2_000, base: 1_000 })));
    }

    #[test]
    fn zero_tries_is_invalid() {
        let base = base_signal(10_000, 2);
        let mut bad = settings(2);
        bad.num_tries = 0;
        assert!(matches!(
            NoiseTester::new(&engine(), &bad, &base, 8_000.0).err(),
            Some(HarnessError::InvalidSettings(_))
        ));
    }

    #[test]
    fn success_falls_as_noise_grows() {
        let base = base_signal(8_000, 4);
        let mut tester = NoiseTester::new(&engine(), &settings(4), &base, 8_000.0).unwrap();
        assert_eq!(tester.track_len(), 2_000);

        let grid = [0.0, 0.5, 1_000.0];
        let passed: Vec<bool> = grid.iter().map(|&s| tester.passes(s).unwrap()).collect();
        assert_eq!(passed, vec![true, true, false]);
        assert!(tester.trials() >= 9);
    }

    #[test]
    fn clean_trials_always_succeed() {
        let base = base_signal(8_000, 5);
        let mut tester = NoiseTester::new(&engine(), &settings(5), &base, 8_000.0).unwrap();
        for _ in 0..5 {
            assert!(tester.trial(0.0).unwrap());
        }
    }

    #[test]
    fn critical_noise_is_reproducible_with_a_seed() {
        let base = base_signal(8_000, 6);
        let first = NoiseTester::new(&engine(), &settings(6), &base, 8_000.0)
            .unwrap()
            .critical_noise()
            .unwrap();
        let second = NoiseTester::new(&engine(), &settings(6), &base, 8_000.0)
            .unwrap()
            .critical_noise()
            .unwrap();

        assert_eq!(first, second);
        assert!(!first.saturated);
        assert!(first.sigma > 0.0 && first.sigma < GROWTH_STEP * 2.0);
        assert!((first.db - 10.0 * (1.0 / (first.sigma * first.sigma)).ln()).abs() < 1e-9);
    }
}
