//! Order processing executor.

use std::sync::Arc;

use async_trait::async_trait;
use bharatmart_db::models::OrderStatus;
use bharatmart_db::repo::{orders, users};
use bharatmart_db::DatabaseAdapter;
use bharatmart_job_queue::{JobContext, JobExecutor, JobQueueError, QueueName};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::JobError;
use crate::payloads::{EmailNotificationJob, EmailType, OrderProcessingJob};
use crate::service::QueueService;

/// Confirms placed orders and queues the confirmation email.
pub struct OrderProcessingExecutor {
    db: Arc<dyn DatabaseAdapter>,
    queues: QueueService,
}

impl OrderProcessingExecutor {
    pub fn new(db: Arc<dyn DatabaseAdapter>, queues: QueueService) -> Self {
        Self { db, queues }
    }

    async fn process(&self, ctx: &JobContext, job: &OrderProcessingJob) -> Result<Value, JobError> {
        let db = self.db.as_ref();
        let order = orders::get(db, &job.order_id)
            .await?
            .ok_or_else(|| JobError::NotFound(format!("order {}", job.order_id)))?;
        ctx.progress(10).await;

        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::Shipped | OrderStatus::Delivered) {
            info!(order_id = %order.id, status = %order.status, "order past confirmation; nothing to do");
            ctx.progress(100).await;
            return Ok(json!({ "orderId": order.id, "status": order.status, "skipped": true }));
        }
        if (order.total_amount - job.total_amount).abs() > 0.01 {
            warn!(
                order_id = %order.id,
                stored = order.total_amount,
                queued = job.total_amount,
                "queued total differs from stored order"
            );
        }

        orders::set_status(db, &order.id, OrderStatus::Processing).await?;
        ctx.progress(40).await;
        orders::set_status(db, &order.id, OrderStatus::Confirmed).await?;
        ctx.progress(80).await;

        match users::find_by_id(db, &job.user_id).await? {
            Some(user) => {
                let email = EmailNotificationJob {
                    to: user.email,
                    subject: format!("Order {} confirmed", order.id),
                    body: format!(
                        "Your order of {} item(s) totalling ₹{:.2} has been confirmed.",
                        job.items.len(),
                        order.total_amount
                    ),
                    email_type: EmailType::OrderConfirmation,
                    order_id: order.id.clone(),
                };
                if let Err(err) = self.queues.add_email(&email).await {
                    warn!(order_id = %order.id, error = %err, "confirmation email not queued");
                }
            }
            None => warn!(order_id = %order.id, user_id = %job.user_id, "order owner not found; no email"),
        }

        ctx.progress(100).await;
        info!(order_id = %order.id, items = job.items.len(), "order confirmed");
        Ok(json!({ "orderId": order.id, "status": OrderStatus::Confirmed }))
    }
}

#[async_trait]
impl JobExecutor for OrderProcessingExecutor {
    fn queue(&self) -> QueueName {
        QueueName::OrderProcessing
    }

    async fn execute(&self, ctx: &JobContext) -> Result<Value, JobQueueError> {
        let job: OrderProcessingJob = ctx.payload_as()?;
        info!(order_id = %job.order_id, attempt = ctx.attempt(), "processing order");
        Ok(self.process(ctx, &job).await?)
    }
}
