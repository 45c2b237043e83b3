//! Recording Controller error types.
//!
//! Failures during session creation are surfaced to the `start` caller and
//! abort creation entirely. Recorder error *events* on a live session are not
//! represented here: they are terminal signals that tear the session down and
//! are observable only through logging.

use thiserror::Error;

/// Recording Controller error type.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Channel join rejected by the recorder capability. No retry.
    #[error("Channel join failed: {0}")]
    Join(String),

    /// Session storage allocation failed. No retry.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Unknown or already-removed session id.
    #[error("Session not found")]
    SessionNotFound,

    /// Registry is draining (graceful shutdown).
    #[error("Registry is draining")]
    Draining,

    /// Registry is at its configured session capacity.
    #[error("Registry at capacity")]
    CapacityExceeded,

    /// Session id collision with a live session.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal error (actor channel plumbing).
    #[error("Internal error: {0}")]
    Internal(String),
}
