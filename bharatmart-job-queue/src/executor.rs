//! Job executor trait for implementing job handlers.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::broker::QueueBroker;
use crate::error::JobQueueError;
use crate::types::{Job, QueueName};

/// Handles every job of one queue.
///
/// Returning `Err` counts as a failed attempt: the runtime schedules a retry
/// or, once the attempt budget is spent, marks the job failed.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// The queue this executor consumes.
    fn queue(&self) -> QueueName;

    /// Execute one attempt. The returned value is stored on the completed job.
    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobQueueError>;
}

/// What an executor sees of the job it is running.
pub struct JobContext {
    job: Job,
    broker: Arc<dyn QueueBroker>,
    progress: AtomicU8,
}

impl JobContext {
    pub(crate) fn new(job: Job, broker: Arc<dyn QueueBroker>) -> Self {
        let progress = AtomicU8::new(job.progress);
        Self {
            job,
            broker,
            progress,
        }
    }

    #[inline]
    pub fn job(&self) -> &Job {
        &self.job
    }

    #[inline]
    pub fn payload(&self) -> &Value {
        &self.job.payload
    }

    /// Decode the payload into the executor's typed job struct.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, JobQueueError> {
        serde_json::from_value(self.job.payload.clone())
            .map_err(|e| JobQueueError::InvalidPayload(e.to_string()))
    }

    /// 1-based number of the attempt being run.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.job.attempts_made
    }

    /// Whether this is the last attempt the job gets.
    #[inline]
    pub fn is_final_attempt(&self) -> bool {
        !self.job.can_retry()
    }

    /// Report progress (clamped to 100). A broker failure here is logged
    /// and does not fail the job.
    pub async fn progress(&self, pct: u8) {
        let pct = pct.min(100);
        self.progress.store(pct, Ordering::Relaxed);
        if let Err(err) = self
            .broker
            .set_progress(self.job.queue, self.job.id, pct)
            .await
        {
            warn!(job_id = %self.job.id, queue = %self.job.queue, error = %err, "failed to record progress");
        }
    }

    pub(crate) fn last_progress(&self) -> u8 {
        self.progress.load(Ordering::Relaxed)
    }
}

/// Completes every job immediately, echoing the payload back.
#[derive(Debug, Clone, Copy)]
pub struct NoOpExecutor {
    queue: QueueName,
}

impl NoOpExecutor {
    pub fn new(queue: QueueName) -> Self {
        Self { queue }
    }
}

#[async_trait]
impl JobExecutor for NoOpExecutor {
    fn queue(&self) -> QueueName {
        self.queue
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobQueueError> {
        ctx.progress(100).await;
        Ok(ctx.payload().clone())
    }
}
