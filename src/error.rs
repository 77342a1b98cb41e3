//! Error types for waveform generation.

use thiserror::Error;

/// Result type for waveform generation.
pub type WaveformResult<T> = Result<T, WaveformError>;

/// Errors that abort a waveform-generation call.
///
/// Numerical non-convergence and trajectory truncation are deliberately not
/// represented here: they are reported per binary as data (see
/// [`ConvergenceFailure`](crate::ConvergenceFailure) and
/// [`ValidLengths::saturated`](crate::ValidLengths::saturated)).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaveformError {
    /// Requested (l, m) pair is not part of the mode registry.
    #[error(
        "Requested mode [(l,m) = ({ell},{mm})] is not available. Allowable modes include {allowed}"
    )]
    InvalidMode { ell: i32, mm: i32, allowed: String },

    /// The same (l, m) pair was requested twice.
    #[error("Requested mode [(l,m) = ({ell},{mm})] appears more than once")]
    DuplicateMode { ell: i32, mm: i32 },

    /// Invalid input array size, value or dimensions.
    #[error("Invalid input in {context}")]
    InvalidInput { context: String },

    /// A valid-length count exceeds the capacity of its ragged array.
    #[error("binary {index}: valid length {count} exceeds allocated capacity {capacity}")]
    RaggedInvariant {
        index: usize,
        count: usize,
        capacity: usize,
    },

    /// The requested numeric backend cannot be constructed.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable {
        backend: &'static str,
        reason: String,
    },

    /// Error from underlying numr operation.
    #[error("numr error: {0}")]
    NumrError(String),
}

impl From<numr::error::Error> for WaveformError {
    fn from(err: numr::error::Error) -> Self {
        Self::NumrError(err.to_string())
    }
}

impl WaveformError {
    pub(crate) fn invalid_input(context: impl Into<String>) -> Self {
        Self::InvalidInput {
            context: context.into(),
        }
    }
}
