//! Errors a lane's run can end in.

use crate::trace::ErrorTrace;
use lanes_core::CancelError;
use thiserror::Error;

/// Terminal failure of a lane's body (or one of its finalizers).
#[derive(Error, Debug, Clone)]
pub enum LaneError {
    /// The body panicked; `std::panic::catch_unwind` caught it.
    #[error("lane body panicked: {message}")]
    Panicked { message: String },

    /// The body returned an error.
    #[error("lane body error: {message}")]
    BodyError { message: String },

    /// A finalizer raised after the body already succeeded or errored;
    /// per §4.4 this replaces the lane's outcome and short-circuits the
    /// remaining finalizer chain.
    #[error("finalizer error: {message}")]
    FinalizerError { message: String },

    /// A hard cancel unwound the lane.
    #[error(transparent)]
    Cancelled(#[from] CancelError),
}

impl LaneError {
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked { message: message.into() }
    }

    pub fn body(message: impl Into<String>) -> Self {
        Self::BodyError { message: message.into() }
    }

    pub fn finalizer(message: impl Into<String>) -> Self {
        Self::FinalizerError { message: message.into() }
    }
}

/// The full outcome of a finished body: the error plus whatever trace the
/// configured error-trace level captured.
#[derive(Debug, Clone)]
pub struct Failure {
    pub error: LaneError,
    pub trace: ErrorTrace,
}
