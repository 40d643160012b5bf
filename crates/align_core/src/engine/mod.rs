//! Alignment engine: locate a track recording within a base recording.
//!
//! # Architecture
//!
//! A match runs through these stages, each in its own module:
//!
//! 1. **Conversion** (`format`): Typed or raw sample buffers become `f32`.
//!
//! 2. **Normalization** (`normalize`): Zero mean, unit variance.
//!
//! 3. **Resampling** (`resample`): Both signals are brought to the session's
//!    working rate with rubato.
//!
//! 4. **Coarse search** (`coarse`): FFT cross-correlation (`spectral`), with
//!    optional spectral filters (`filters`), picks the best lag.
//!
//! 5. **Refinement** (`refine`): The lag is corrected at the base's full rate
//!    within the quantization radius of the working rate.
//!
//! `session` ties the stages together and enforces the lifecycle.
//!
//! # Usage
//!
//! ```no_run
//! use align_core::engine::{SampleBuffer, Session};
//!
//! let base: Vec<f32> = vec![0.0; 48_000];
//! let track: Vec<f32> = base[12_000..24_000].to_vec();
//!
//! let mut session = Session::new(8_000.0, 2)?;
//! session.set_base(SampleBuffer::Float32(&base), 48_000.0)?;
//! let result = session.match_track(SampleBuffer::Float32(&track), 48_000.0)?;
//! println!("offset {} length {}", result.offset, result.length);
//! # Ok::<(), align_core::engine::EngineError>(())
//! ```

pub mod coarse;
pub mod filters;
pub mod format;
pub mod normalize;
pub mod refine;
pub mod resample;
pub mod session;
pub mod spectral;
pub mod types;

pub use filters::{BandLimit, PhaseTransform, SpectralFilter};
pub use format::{convert_raw, SampleBuffer, SampleFormat};
pub use normalize::normalize;
pub use resample::{resample, ResampleQuality};
pub use session::{BaseSignal, Session, SessionStatus};
pub use spectral::SpectralEngine;
pub use types::{EngineError, EngineResult, MatchResult, ResultCode};

/// Result code of an engine call, `Success` for `Ok`.
pub fn result_code<T>(result: &EngineResult<T>) -> ResultCode {
    match result {
        Ok(_) => ResultCode::Success,
        Err(e) => e.code(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_code_maps_ok_and_err() {
        assert_eq!(result_code(&Ok::<(), EngineError>(())), ResultCode::Success);
        assert_eq!(
            result_code::<()>(&Err(EngineError::BaseNotSet)),
            ResultCode::BaseNotSet
        );
    }
}
