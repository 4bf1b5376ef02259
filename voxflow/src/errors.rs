//! Error types for the voxflow core.

use thiserror::Error;

/// The main error type for voxflow operations.
#[derive(Debug, Error)]
pub enum VoxflowError {
    /// PCM format conversion failed.
    #[error("format conversion failed: {0}")]
    FormatConversion(String),

    /// A PCM format the converter cannot handle.
    #[error("unsupported PCM format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value was out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

/// Error returned by the retry loop.
///
/// Exhaustion carries the final operation error unchanged so callers can
/// inspect or re-surface it.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    /// All attempts failed; holds the last error.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The error from the final attempt.
        last_error: E,
    },

    /// Cancellation was requested before the operation succeeded.
    #[error("retry cancelled: {0}")]
    Cancelled(String),
}

impl<E> RetryError<E>
where
    E: std::fmt::Display + std::fmt::Debug,
{
    /// Returns the underlying operation error, if exhaustion occurred.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Exhausted { last_error, .. } => Some(last_error),
            Self::Cancelled(_) => None,
        }
    }
}
