//! Payment processing executor.

use std::sync::Arc;

use async_trait::async_trait;
use bharatmart_db::models::{Payment, PaymentStatus};
use bharatmart_db::repo::{orders, payments, users};
use bharatmart_db::DatabaseAdapter;
use bharatmart_job_queue::{JobContext, JobExecutor, JobQueueError, QueueName};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::JobError;
use crate::payloads::{EmailNotificationJob, EmailType, PaymentProcessingJob};
use crate::service::QueueService;

/// Charges a payment and returns the provider's transaction id.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, payment: &PaymentProcessingJob) -> Result<String, JobError>;
}

/// Approves every positive amount with a generated transaction id.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, payment: &PaymentProcessingJob) -> Result<String, JobError> {
        if !payment.amount.is_finite() || payment.amount <= 0.0 {
            return Err(JobError::Declined(format!("invalid amount {}", payment.amount)));
        }
        Ok(format!("txn_{}", uuid::Uuid::new_v4().simple()))
    }
}

pub struct PaymentProcessingExecutor {
    db: Arc<dyn DatabaseAdapter>,
    queues: QueueService,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentProcessingExecutor {
    pub fn new(db: Arc<dyn DatabaseAdapter>, queues: QueueService, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { db, queues, gateway }
    }

    /// Reuse the order's pending payment, or record one for this job.
    async fn pending_payment(&self, job: &PaymentProcessingJob) -> Result<Payment, JobError> {
        let db = self.db.as_ref();
        let existing = payments::list_for_order(db, &job.order_id)
            .await?
            .into_iter()
            .find(|p| p.status == PaymentStatus::Pending);
        match existing {
            Some(payment) => Ok(payment),
            None => Ok(payments::create(db, &job.order_id, job.amount, Some(job.payment_method.clone())).await?),
        }
    }

    async fn notify(&self, job: &PaymentProcessingJob, email_type: EmailType, detail: &str) {
        let to = match users::find_by_id(self.db.as_ref(), &job.user_id).await {
            Ok(Some(user)) => user.email,
            Ok(None) => {
                warn!(user_id = %job.user_id, "payer not found; no email");
                return;
            }
            Err(err) => {
                warn!(user_id = %job.user_id, error = %err, "payer lookup failed; no email");
                return;
            }
        };
        let (subject, body) = match email_type {
            EmailType::PaymentFailed => (
                format!("Payment for order {} failed", job.order_id),
                format!("We could not process your payment of ₹{:.2}: {detail}", job.amount),
            ),
            _ => (
                format!("Payment received for order {}", job.order_id),
                format!("Your payment of ₹{:.2} was successful. Reference: {detail}", job.amount),
            ),
        };
        let email = EmailNotificationJob {
            to,
            subject,
            body,
            email_type,
            order_id: job.order_id.clone(),
        };
        if let Err(err) = self.queues.add_email(&email).await {
            warn!(order_id = %job.order_id, error = %err, "payment email not queued");
        }
    }

    async fn record_failure(&self, payment: &Payment, job: &PaymentProcessingJob, reason: &str) -> Result<(), JobError> {
        payments::mark(self.db.as_ref(), &payment.id, PaymentStatus::Failed, None).await?;
        self.notify(job, EmailType::PaymentFailed, reason).await;
        Ok(())
    }

    async fn process(&self, ctx: &JobContext, job: &PaymentProcessingJob) -> Result<Value, JobError> {
        let order = orders::get(self.db.as_ref(), &job.order_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("order {}", job.order_id)))?;
        if order.payment_status == PaymentStatus::Completed {
            info!(order_id = %order.id, "order already paid");
            ctx.progress(100).await;
            return Ok(json!({ "success": true, "orderId": order.id, "alreadyPaid": true }));
        }
        let payment = self.pending_payment(job).await?;
        ctx.progress(30).await;

        if (job.amount - order.total_amount).abs() > 0.01 {
            let reason = format!(
                "amount {:.2} does not match order total {:.2}",
                job.amount, order.total_amount
            );
            warn!(order_id = %order.id, payment_id = %payment.id, %reason, "payment rejected");
            self.record_failure(&payment, job, &reason).await?;
            ctx.progress(100).await;
            return Ok(json!({ "success": false, "paymentId": payment.id, "reason": reason }));
        }

        match self.gateway.charge(job).await {
            Ok(transaction_id) => {
                ctx.progress(70).await;
                payments::mark(self.db.as_ref(), &payment.id, PaymentStatus::Completed, Some(&transaction_id))
                    .await?;
                self.notify(job, EmailType::PaymentSuccess, &transaction_id).await;
                ctx.progress(100).await;
                info!(order_id = %order.id, payment_id = %payment.id, %transaction_id, "payment completed");
                Ok(json!({
                    "success": true,
                    "paymentId": payment.id,
                    "transactionId": transaction_id,
                }))
            }
            Err(JobError::Declined(reason)) => {
                warn!(order_id = %order.id, payment_id = %payment.id, %reason, "payment declined");
                self.record_failure(&payment, job, &reason).await?;
                ctx.progress(100).await;
                Ok(json!({ "success": false, "paymentId": payment.id, "reason": reason }))
            }
            Err(err) => {
                if ctx.is_final_attempt() {
                    error!(order_id = %order.id, payment_id = %payment.id, error = %err, "payment failed after final attempt");
                    self.record_failure(&payment, job, &err.to_string()).await?;
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl JobExecutor for PaymentProcessingExecutor {
    fn queue(&self) -> QueueName {
        QueueName::PaymentProcessing
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobQueueError> {
        let job: PaymentProcessingJob = ctx.payload_as()?;
        info!(order_id = %job.order_id, amount = job.amount, attempt = ctx.attempt(), "processing payment");
        Ok(self.process(ctx, &job).await?)
    }
}
