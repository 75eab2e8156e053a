//! Error types for blockwise

use thiserror::Error;

/// Result type alias using blockwise's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in blockwise operations
///
/// Every variant except [`Error::TaskFailed`] is fatal for the job that
/// produced it. Shape, rank and strategy errors are raised while validating a
/// job, before any block is evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Shape mismatch between operands, or between a block and its layout
    #[error("Shape mismatch in {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Which operand or relation failed the check
        what: &'static str,
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Factorization rank is not usable
    #[error("Invalid factorization rank {rank}: rank must be at least 1")]
    InvalidRank {
        /// The offending rank
        rank: usize,
    },

    /// The requested distribution strategy cannot be realized for the block layout
    #[error("Strategy configuration error: {reason}")]
    StrategyConfiguration {
        /// Description of the incompatibility
        reason: String,
    },

    /// A single task attempt failed on a distributed backend
    ///
    /// Backends retry these; callers only observe [`Error::BackendExecution`].
    #[error("Task {task} failed on attempt {attempt}")]
    TaskFailed {
        /// Task identifier
        task: String,
        /// 1-based attempt number
        attempt: usize,
    },

    /// A distributed backend exhausted its retries
    #[error("{backend} execution failed for task {task} after {attempts} attempts: {reason}")]
    BackendExecution {
        /// Backend name
        backend: &'static str,
        /// Task identifier
        task: String,
        /// Number of attempts made
        attempts: usize,
        /// Last failure
        reason: String,
    },

    /// Backend setup or substrate error
    #[error("Backend error: {0}")]
    Backend(String),

    /// Index out of bounds
    #[error("Index {index} out of bounds for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index
        index: usize,
        /// Size of the dimension
        size: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(what: &'static str, expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a strategy configuration error
    pub fn strategy_configuration(reason: impl Into<String>) -> Self {
        Self::StrategyConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Returns true if retrying the failed unit of work may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TaskFailed { .. })
    }
}
