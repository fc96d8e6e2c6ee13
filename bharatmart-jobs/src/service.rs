//! Producer side: typed wrappers around the three queues.

use bharatmart_job_queue::{
    EnqueueResult, JobOptions, JobQueueClient, JobQueueError, QueueName, QueueStats,
};
use serde::Serialize;
use serde_json::Value;

use crate::payloads::{EmailNotificationJob, OrderProcessingJob, PaymentProcessingJob};

/// Job counts for every queue, as served by the stats endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatsReport {
    pub orders: QueueStats,
    pub emails: QueueStats,
    pub payments: QueueStats,
}

#[derive(Debug, Clone, Default)]
pub struct QueueService {
    client: JobQueueClient,
}

fn to_payload<T: Serialize>(job: &T) -> Result<Value, JobQueueError> {
    serde_json::to_value(job).map_err(|e| JobQueueError::InvalidPayload(e.to_string()))
}

impl QueueService {
    pub fn new(client: JobQueueClient) -> Self {
        Self { client }
    }

    #[inline]
    pub fn client(&self) -> &JobQueueClient {
        &self.client
    }

    pub async fn add_order(&self, job: &OrderProcessingJob) -> Result<EnqueueResult, JobQueueError> {
        self.client
            .enqueue_with(QueueName::OrderProcessing, to_payload(job)?, JobOptions::priority(1))
            .await
    }

    /// Payment-failure emails jump ahead of routine notifications.
    pub async fn add_email(&self, job: &EmailNotificationJob) -> Result<EnqueueResult, JobQueueError> {
        self.client
            .enqueue_with(
                QueueName::EmailNotifications,
                to_payload(job)?,
                JobOptions::priority(job.email_type.priority()),
            )
            .await
    }

    pub async fn add_payment(&self, job: &PaymentProcessingJob) -> Result<EnqueueResult, JobQueueError> {
        self.client
            .enqueue_with(QueueName::PaymentProcessing, to_payload(job)?, JobOptions::priority(1))
            .await
    }

    pub async fn stats(&self) -> Result<QueueStatsReport, JobQueueError> {
        Ok(QueueStatsReport {
            orders: self.client.stats(QueueName::OrderProcessing).await?,
            emails: self.client.stats(QueueName::EmailNotifications).await?,
            payments: self.client.stats(QueueName::PaymentProcessing).await?,
        })
    }
}
