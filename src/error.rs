use thiserror::Error;

/// Errors returned by the clustering and seeding routines in this crate.
///
/// Only configuration problems are errors. Running out of iterations, or
/// converging to fewer clusters than requested, are ordinary results.
#[derive(Debug, Error)]
pub enum Error {
    /// Input slice is empty.
    #[error("empty input")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Human-readable explanation.
        message: &'static str,
    },

    /// The number of initial center sets does not match the number of runs.
    #[error("invalid run count: expected {expected} center sets, found {found}")]
    InvalidRunCount {
        /// Number of runs the caller configured.
        expected: usize,
        /// Number of center sets supplied.
        found: usize,
    },

    /// Vectors have inconsistent dimensionality.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimensionality.
        expected: usize,
        /// Found dimensionality.
        found: usize,
    },
}

/// Result type used by this crate.
pub type Result<T> = std::result::Result<T, Error>;
