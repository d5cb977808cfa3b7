//! Error types for the estimation engine.
//!
//! - `SamplingError`: failures reported by (or detected in the output of) the
//!   user sampling function
//! - `HistoryError`: failures while persisting run history
//! - `EstimatorError`: everything an estimation run can return to its caller

use mimc_core::config::ConfigError;
use mimc_core::types::Index;
use thiserror::Error;

/// Failure of a single sample evaluation.
///
/// Propagated to the caller of the current batch; the engine never retries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    /// The sampling function could not produce a valid sample.
    #[error("Sampling function failed: {0}")]
    Failed(String),

    /// The sample has the wrong number of quantities of interest.
    #[error("Expected {expected} quantities of interest, got {found}")]
    QoiMismatch {
        /// Configured number of quantities of interest.
        expected: usize,
        /// Number of values returned.
        found: usize,
    },

    /// The sample contains NaN or an infinite value.
    #[error("Non-finite value for quantity of interest {qoi}")]
    NonFinite {
        /// Position of the offending quantity of interest.
        qoi: usize,
    },
}

impl SamplingError {
    /// Creates a [`SamplingError::Failed`] error.
    pub fn failed(message: impl Into<String>) -> Self {
        SamplingError::Failed(message.into())
    }
}

/// Failure while persisting run history.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Filesystem error.
    #[error("History I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialisation error.
    #[error("History serialisation error: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Error returned by estimator construction and estimation runs.
///
/// Index-set exhaustion is not an error; see
/// [`RunOutcome`](crate::estimator::RunOutcome).
#[derive(Error, Debug)]
pub enum EstimatorError {
    /// Invalid or conflicting configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The sampling function failed while sampling at `index`.
    #[error("Sampling failed at index {index}: {source}")]
    Sampling {
        /// Index being sampled.
        index: Index,
        /// Underlying failure.
        #[source]
        source: SamplingError,
    },

    /// Requested tolerance is not strictly positive and finite.
    #[error("Invalid tolerance {0}: must be positive and finite")]
    InvalidTolerance(f64),

    /// History persistence failed.
    #[error(transparent)]
    History(#[from] HistoryError),
}
