//! Error taxonomy for the artifact identification pipeline.
//!
//! Every error is terminal for the recording being processed. The cohort
//! driver decides whether to skip the recording or abort the batch.
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IcaError {
    /// A required channel name is absent from the buffer.
    #[error("channel '{name}' not found in recording")]
    MissingChannel { name: String },

    /// Nonsensical band-pass cutoffs for the given sample rate.
    #[error("invalid filter range: low={low} Hz, high={high} Hz (nyquist {nyquist} Hz)")]
    InvalidFilterRange { low: f64, high: f64, nyquist: f64 },

    /// More components requested than the data can support.
    #[error("requested {requested} components but only {available} are available")]
    InsufficientChannels { requested: usize, available: usize },

    /// An iterative solver hit its iteration cap.
    #[error("{stage} did not converge after {iterations} iterations (residual {residual:.2e} > tol {tolerance:.1e})")]
    Convergence {
        stage: &'static str,
        iterations: usize,
        tolerance: f64,
        residual: f64,
    },

    /// Recording source failure, surfaced unchanged.
    #[error("unreadable recording {}: {reason}", path.display())]
    UnreadableRecording { path: PathBuf, reason: String },

    /// Buffer construction violated a structural invariant.
    #[error("invalid signal buffer: {0}")]
    InvalidBuffer(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Subject catalog could not be read.
    #[error("catalog {}: {reason}", path.display())]
    Catalog { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, IcaError>;

impl IcaError {
    pub(crate) fn missing(name: &str) -> Self {
        IcaError::MissingChannel { name: name.to_string() }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IcaError::UnreadableRecording { path: path.into(), reason: reason.to_string() }
    }
}
