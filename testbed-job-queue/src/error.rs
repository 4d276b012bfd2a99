//! Error types for the job queue system.

use thiserror::Error;

/// Errors that may occur while interacting with the job queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobQueueError {
    #[error("job queue is shutting down")]
    ShuttingDown,
}

/// Failure of a job's internal action.
///
/// These never leave the queue; they are captured on the job and surface
/// only through its outcome.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{0}")]
    Failed(String),

    #[error("job cancelled")]
    Cancelled,

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
