//! Error types for the job queue system.

use thiserror::Error;
use uuid::Uuid;

use crate::types::QueueName;

/// Errors that may occur while interacting with the job queue.
#[derive(Debug, Error)]
pub enum JobQueueError {
    /// The broker could not be reached. Producers should treat this as
    /// degraded background processing.
    #[error("job queue backend is unavailable: {0}")]
    Unavailable(String),

    #[error("job queue backend error: {0}")]
    Backend(String),

    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("an executor is already registered for queue {0}")]
    ExecutorExists(QueueName),

    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("invalid job payload: {0}")]
    InvalidPayload(String),

    #[error("job execution failed: {0}")]
    ExecutionFailed(String),

    #[error("job timed out after {0} ms")]
    Timeout(u64),
}

impl JobQueueError {
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// A payload that does not decode will not decode on the next attempt
    /// either.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidPayload(_))
    }
}

impl From<redis::RedisError> for JobQueueError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_io_error()
            || err.is_timeout()
        {
            JobQueueError::Unavailable(err.to_string())
        } else {
            JobQueueError::Backend(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JobQueueError {
    fn from(err: serde_json::Error) -> Self {
        JobQueueError::Backend(format!("job encoding: {err}"))
    }
}
