//! Alignment session: owns the base signal and runs matches against it.
//!
//! Lifecycle: `Empty -> BaseSet -> Destroyed`. The base is set exactly once;
//! matches borrow the session immutably, so any number of them can run at
//! once from different threads.

use super::coarse::coarse_match;
use super::filters::SpectralFilter;
use super::format::{convert_raw, SampleBuffer, SampleFormat};
use super::normalize::normalize;
use super::refine::refine;
use super::resample::{resample, ResampleQuality};
use super::spectral::SpectralEngine;
use super::types::{EngineError, EngineResult, MatchResult};
use crate::config::EngineSettings;

/// The base recording in the two resolutions the engine needs.
#[derive(Debug, Clone)]
pub struct BaseSignal {
    /// Normalized samples at the base's own rate (used for refinement).
    pub full: Vec<f32>,
    /// Normalized samples at the working rate (used for the coarse search).
    pub working: Vec<f32>,
    /// The base's original sample rate.
    pub sample_rate: f64,
}

#[derive(Debug)]
enum SessionState {
    Empty,
    BaseSet(BaseSignal),
    Destroyed,
}

/// Observable lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Empty,
    BaseSet,
    Destroyed,
}

/// An alignment engine instance comparing tracks against one base.
pub struct Session {
    working_rate: f64,
    quality: ResampleQuality,
    spectral: SpectralEngine,
    filters: Vec<Box<dyn SpectralFilter>>,
    state: SessionState,
}

impl Session {
    /// Create an empty session matching at `working_rate` with `thread_count`
    /// workers (values below one are treated as one).
    pub fn new(working_rate: f64, thread_count: usize) -> EngineResult<Self> {
        if !(working_rate.is_finite() && working_rate > 0.0) {
            return Err(EngineError::invalid(format!(
                "working sample rate must be positive, got {working_rate}"
            )));
        }
        let spectral = SpectralEngine::new(thread_count)?;
        tracing::debug!(
            working_rate,
            threads = spectral.thread_count(),
            "Created alignment session"
        );
        Ok(Self {
            working_rate,
            quality: ResampleQuality::default(),
            spectral,
            filters: Vec::new(),
            state: SessionState::Empty,
        })
    }

    /// Create a session from the `[engine]` config section.
    pub fn from_settings(settings: &EngineSettings) -> EngineResult<Self> {
        let mut session = Self::new(settings.working_sample_rate, settings.thread_count)?;
        session.quality = settings.resample_quality;
        Ok(session)
    }

    /// Rate at which the coarse search runs.
    pub fn working_sample_rate(&self) -> f64 {
        self.working_rate
    }

    /// Number of worker threads.
    pub fn thread_count(&self) -> usize {
        self.spectral.thread_count()
    }

    /// Current resampling algorithm.
    pub fn resample_quality(&self) -> ResampleQuality {
        self.quality
    }

    /// Lifecycle state.
    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Empty => SessionStatus::Empty,
            SessionState::BaseSet(_) => SessionStatus::BaseSet,
            SessionState::Destroyed => SessionStatus::Destroyed,
        }
    }

    /// The base signal, once set.
    pub fn base(&self) -> Option<&BaseSignal> {
        match &self.state {
            SessionState::BaseSet(base) => Some(base),
            _ => None,
        }
    }

    /// Original rate of the base, once set.
    pub fn base_sample_rate(&self) -> Option<f64> {
        self.base().map(|b| b.sample_rate)
    }

    /// Names of the installed spectral filters, in application order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Choose the resampling algorithm. Only allowed before the base is set,
    /// since the stored working-rate base was produced with it.
    pub fn set_resample_quality(&mut self, quality: ResampleQuality) -> EngineResult<()> {
        match self.state {
            SessionState::Destroyed => Err(EngineError::NullHandle),
            SessionState::BaseSet(_) => Err(EngineError::invalid(
                "resample quality cannot change once the base is set",
            )),
            SessionState::Empty => {
                self.quality = quality;
                Ok(())
            }
        }
    }

    /// [`set_resample_quality`](Self::set_resample_quality) from a numeric value.
    pub fn set_resample_quality_raw(&mut self, raw: i32) -> EngineResult<()> {
        if let SessionState::Destroyed = self.state {
            return Err(EngineError::NullHandle);
        }
        self.set_resample_quality(ResampleQuality::from_raw(raw)?)
    }

    /// Append a spectral filter. Only allowed before the base is set.
    pub fn add_filter(&mut self, filter: Box<dyn SpectralFilter>) -> EngineResult<()> {
        match self.state {
            SessionState::Destroyed => Err(EngineError::NullHandle),
            SessionState::BaseSet(_) => Err(EngineError::invalid(
                "filters cannot be added once the base is set",
            )),
            SessionState::Empty => {
                tracing::debug!(filter = filter.name(), "Added spectral filter");
                self.filters.push(filter);
                Ok(())
            }
        }
    }

    /// Set the base signal. Allowed exactly once.
    ///
    /// On failure the session is left as it was.
    pub fn set_base(&mut self, samples: SampleBuffer<'_>, sample_rate: f64) -> EngineResult<()> {
        match self.state {
            SessionState::Destroyed => return Err(EngineError::NullHandle),
            SessionState::BaseSet(_) => return Err(EngineError::AlreadySetBase),
            SessionState::Empty => {}
        }
        check_input(samples.len(), sample_rate)?;
        let full = samples.to_f32()?;
        self.install_base(full, sample_rate)
    }

    /// [`set_base`](Self::set_base) from native-endian raw bytes.
    pub fn set_base_raw(
        &mut self,
        format: SampleFormat,
        bytes: &[u8],
        sample_rate: f64,
    ) -> EngineResult<()> {
        match self.state {
            SessionState::Destroyed => return Err(EngineError::NullHandle),
            SessionState::BaseSet(_) => return Err(EngineError::AlreadySetBase),
            SessionState::Empty => {}
        }
        let full = convert_raw(format, bytes)?;
        check_input(full.len(), sample_rate)?;
        self.install_base(full, sample_rate)
    }

    fn install_base(&mut self, mut full: Vec<f32>, sample_rate: f64) -> EngineResult<()> {
        normalize(&mut full, Some(self.spectral.pool()));

        let ratio = self.working_rate / sample_rate;
        let working = if ratio != 1.0 {
            resample(&full, ratio, self.quality)?
        } else {
            full.clone()
        };
        if working.is_empty() {
            return Err(EngineError::invalid(format!(
                "base of {} samples is empty at the working rate",
                full.len()
            )));
        }

        tracing::info!(
            samples = full.len(),
            sample_rate,
            working_samples = working.len(),
            working_rate = self.working_rate,
            "Base signal set"
        );
        self.state = SessionState::BaseSet(BaseSignal {
            full,
            working,
            sample_rate,
        });
        Ok(())
    }

    /// Locate `samples` (a track recorded at `sample_rate`) in the base.
    pub fn match_track(
        &self,
        samples: SampleBuffer<'_>,
        sample_rate: f64,
    ) -> EngineResult<MatchResult> {
        let base = self.require_base()?;
        check_input(samples.len(), sample_rate)?;
        let track = samples.to_f32()?;
        self.locate(base, track, sample_rate)
    }

    /// [`match_track`](Self::match_track) from native-endian raw bytes.
    pub fn match_track_raw(
        &self,
        format: SampleFormat,
        bytes: &[u8],
        sample_rate: f64,
    ) -> EngineResult<MatchResult> {
        let base = self.require_base()?;
        let track = convert_raw(format, bytes)?;
        check_input(track.len(), sample_rate)?;
        self.locate(base, track, sample_rate)
    }

    /// Run only the full-rate refinement around a known `offset`.
    pub fn refine_offset(
        &self,
        samples: SampleBuffer<'_>,
        sample_rate: f64,
        offset: i64,
    ) -> EngineResult<i64> {
        let base = self.require_base()?;
        check_input(samples.len(), sample_rate)?;
        let mut track = samples.to_f32()?;
        normalize(&mut track, Some(self.spectral.pool()));
        refine(
            Some(self.spectral.pool()),
            base,
            self.working_rate,
            self.quality,
            &track,
            sample_rate,
            offset,
        )
    }

    fn locate(
        &self,
        base: &BaseSignal,
        mut track: Vec<f32>,
        sample_rate: f64,
    ) -> EngineResult<MatchResult> {
        normalize(&mut track, Some(self.spectral.pool()));

        let coarse = coarse_match(
            &self.spectral,
            &self.filters,
            base,
            self.working_rate,
            self.quality,
            &track,
            sample_rate,
        )?;
        let offset = refine(
            Some(self.spectral.pool()),
            base,
            self.working_rate,
            self.quality,
            &track,
            sample_rate,
            coarse.offset,
        )?;

        let result = MatchResult::new(offset, coarse.length);
        tracing::info!(
            offset = result.offset,
            length = result.length,
            track_samples = track.len(),
            track_rate = sample_rate,
            "Track matched"
        );
        Ok(result)
    }

    fn require_base(&self) -> EngineResult<&BaseSignal> {
        match &self.state {
            SessionState::Destroyed => Err(EngineError::NullHandle),
            SessionState::Empty => Err(EngineError::BaseNotSet),
            SessionState::BaseSet(base) => Ok(base),
        }
    }

    /// Release the base buffers and filters. Later calls fail with
    /// `NullHandle`; destroying twice is harmless.
    pub fn destroy(&mut self) {
        if !matches!(self.state, SessionState::Destroyed) {
            tracing::debug!("Destroyed alignment session");
        }
        self.state = SessionState::Destroyed;
        self.filters.clear();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("working_rate", &self.working_rate)
            .field("quality", &self.quality)
            .field("threads", &self.spectral.thread_count())
            .field("filters", &self.filter_names())
            .field("status", &self.status())
            .finish()
    }
}

fn check_input(len: usize, sample_rate: f64) -> EngineResult<()> {
    if len == 0 {
        return Err(EngineError::invalid("signal has no samples"));
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(EngineError::invalid(format!(
            "sample rate must be positive, got {sample_rate}"
        )));
    }
    Ok(())
}
