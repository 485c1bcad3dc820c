//! Error types for the arbiter runtime

use thiserror::Error;

/// Result type alias for arbiter operations
pub type ArbiterResult<T> = Result<T, ArbiterError>;

/// Errors surfaced to the arbiter's owner
///
/// Device failures are not here: they are forwarded to the owner's error
/// callback as `CaptureError` values.
#[derive(Error, Debug)]
pub enum ArbiterError {
    #[error("arbiter is no longer running")]
    Closed,

    #[error("arbiter task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
