//! Core types for the alignment engine.

use serde::{Deserialize, Serialize};

/// Where a track sits inside the base.
///
/// Both fields are expressed in samples at the base's original sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Base sample index at which the track starts (negative if the track
    /// starts before the base).
    pub offset: i64,
    /// Track duration in base samples.
    pub length: u64,
}

impl MatchResult {
    /// Create a new match result.
    pub fn new(offset: i64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Offset in seconds for a base recorded at `base_rate`.
    pub fn offset_secs(&self, base_rate: f64) -> f64 {
        self.offset as f64 / base_rate
    }

    /// Length in seconds for a base recorded at `base_rate`.
    pub fn length_secs(&self, base_rate: f64) -> f64 {
        self.length as f64 / base_rate
    }
}

/// Stable result codes reported by every engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    InvalidArgument,
    AlreadySetBase,
    BaseNotSet,
    NullHandle,
    AllocationError,
}

impl ResultCode {
    /// Fixed diagnostic message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            ResultCode::Success => "Success",
            ResultCode::InvalidArgument => "Invalid argument",
            ResultCode::AlreadySetBase => "Base signal already set",
            ResultCode::BaseNotSet => "Base signal not set",
            ResultCode::NullHandle => "Null or destroyed engine handle",
            ResultCode::AllocationError => "Allocation failed, likely out of memory",
        }
    }

    /// Numeric value of the code.
    pub fn as_raw(&self) -> i32 {
        match self {
            ResultCode::Success => 0,
            ResultCode::InvalidArgument => 1,
            ResultCode::AlreadySetBase => 2,
            ResultCode::BaseNotSet => 3,
            ResultCode::NullHandle => 4,
            ResultCode::AllocationError => 100,
        }
    }

    /// Look up a code by its numeric value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ResultCode::Success),
            1 => Some(ResultCode::InvalidArgument),
            2 => Some(ResultCode::AlreadySetBase),
            3 => Some(ResultCode::BaseNotSet),
            4 => Some(ResultCode::NullHandle),
            100 => Some(ResultCode::AllocationError),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Error types for engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A caller-supplied value was rejected.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The base signal can only be set once per session.
    #[error("Base signal already set")]
    AlreadySetBase,

    /// Matching or refining requires a base signal.
    #[error("Base signal not set")]
    BaseNotSet,

    /// The session was destroyed.
    #[error("Null or destroyed engine handle")]
    NullHandle,

    /// A working buffer could not be allocated.
    #[error("Could not allocate buffer of {bytes} bytes")]
    Allocation { bytes: usize },

    /// The resampler rejected its parameters or failed mid-stream.
    #[error("Resampler error: {0}")]
    Resampler(String),

    /// The FFT backend rejected a buffer.
    #[error("Spectral transform failed: {0}")]
    Transform(String),

    /// Worker threads could not be started.
    #[error("Could not start worker threads: {0}")]
    ThreadPool(String),
}

impl EngineError {
    /// Create an invalid argument error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Result code this error reports as.
    pub fn code(&self) -> ResultCode {
        match self {
            EngineError::InvalidArgument(_)
            | EngineError::Resampler(_)
            | EngineError::Transform(_) => ResultCode::InvalidArgument,
            EngineError::AlreadySetBase => ResultCode::AlreadySetBase,
            EngineError::BaseNotSet => ResultCode::BaseNotSet,
            EngineError::NullHandle => ResultCode::NullHandle,
            EngineError::Allocation { .. } | EngineError::ThreadPool(_) => {
                ResultCode::AllocationError
            }
        }
    }
}

/// Type alias for engine results.
pub type EngineResult<T> = Result<T, EngineError>;

/// Allocate a zero-filled buffer, reporting failure instead of aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> EngineResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// Allocate an empty buffer with room for `len` elements.
pub(crate) fn try_with_capacity<T>(len: usize) -> EngineResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| EngineError::Allocation {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    Ok(buffer)
}
