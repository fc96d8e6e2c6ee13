//! Job execution errors.

use bharatmart_db::repo::RepoError;
use bharatmart_db::DbError;
use bharatmart_job_queue::JobQueueError;
use thiserror::Error;

/// Errors that may occur during job execution.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("payment declined: {0}")]
    Declined(String),

    #[error("email delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Queue(#[from] JobQueueError),
}

impl From<JobError> for JobQueueError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Queue(inner) => inner,
            JobError::InvalidPayload(msg) => JobQueueError::InvalidPayload(msg),
            other => JobQueueError::ExecutionFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_errors_stay_non_retryable() {
        let err: JobQueueError = JobError::InvalidPayload("missing orderId".into()).into();
        assert!(matches!(err, JobQueueError::InvalidPayload(_)));
        assert!(!err.is_retryable());

        let err: JobQueueError = JobError::Declined("insufficient funds".into()).into();
        assert!(err.is_retryable());
    }
}
