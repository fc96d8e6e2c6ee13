//! Email notification executor.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bharatmart_job_queue::{JobContext, JobExecutor, JobQueueError, QueueName};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::JobError;
use crate::payloads::EmailNotificationJob;

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailNotificationJob) -> Result<(), JobError>;
}

/// Logs the message instead of sending it, after a simulated delivery delay.
#[derive(Debug, Clone)]
pub struct LogMailer {
    delay: Duration,
}

impl LogMailer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for LogMailer {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &EmailNotificationJob) -> Result<(), JobError> {
        if !email.to.contains('@') {
            return Err(JobError::Delivery(format!("invalid recipient {:?}", email.to)));
        }
        tokio::time::sleep(self.delay).await;
        info!(
            to = %email.to,
            subject = %email.subject,
            email_type = %email.email_type,
            order_id = %email.order_id,
            "email delivered (log transport)"
        );
        Ok(())
    }
}

pub struct EmailNotificationExecutor {
    mailer: Arc<dyn Mailer>,
}

impl EmailNotificationExecutor {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl JobExecutor for EmailNotificationExecutor {
    fn queue(&self) -> QueueName {
        QueueName::EmailNotifications
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobQueueError> {
        let email: EmailNotificationJob = ctx.payload_as()?;
        info!(
            email_type = %email.email_type,
            order_id = %email.order_id,
            to = %email.to,
            attempt = ctx.attempt(),
            "sending email"
        );
        ctx.progress(20).await;

        if let Err(err) = self.mailer.send(&email).await {
            error!(order_id = %email.order_id, error = %err, "failed to send email");
            return Err(err.into());
        }
        ctx.progress(60).await;

        let sent_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        ctx.progress(100).await;
        Ok(json!({
            "success": true,
            "emailType": email.email_type,
            "sentAt": sent_at,
        }))
    }
}
