//! Concrete job implementations for the BharatMart backend.
//!
//! This crate provides the typed payloads, the [`QueueService`] producers use,
//! and one [`JobExecutor`](bharatmart_job_queue::JobExecutor) per queue.
//!
//! # Queues
//!
//! - `order-processing` - confirm a placed order, queue the confirmation email
//! - `email-notifications` - deliver an email through a [`Mailer`]
//! - `payment-processing` - settle a payment, queue the outcome email
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bharatmart_job_queue::JobQueueClient;
//! use bharatmart_jobs::{register_all_executors, JobDependencies, LogMailer, SimulatedGateway};
//!
//! # async fn demo(db: Arc<dyn bharatmart_db::DatabaseAdapter>) -> Result<(), bharatmart_job_queue::JobQueueError> {
//! let client = JobQueueClient::in_memory();
//! register_all_executors(
//!     &client,
//!     JobDependencies {
//!         db,
//!         mailer: Arc::new(LogMailer::default()),
//!         gateway: Arc::new(SimulatedGateway),
//!     },
//! )
//! .await?;
//! # Ok(())
//! # }
//! ```

mod email;
mod error;
mod order;
mod payloads;
mod payment;
mod service;

pub use email::{EmailNotificationExecutor, LogMailer, Mailer};
pub use error::JobError;
pub use order::OrderProcessingExecutor;
pub use payloads::{
    EmailNotificationJob, EmailType, OrderJobItem, OrderProcessingJob, PaymentProcessingJob,
};
pub use payment::{PaymentGateway, PaymentProcessingExecutor, SimulatedGateway};
pub use service::{QueueService, QueueStatsReport};

use std::sync::Arc;

use bharatmart_db::DatabaseAdapter;
use bharatmart_job_queue::{JobQueueClient, JobQueueError};

/// What the executors need from the rest of the application.
#[derive(Clone)]
pub struct JobDependencies {
    pub db: Arc<dyn DatabaseAdapter>,
    pub mailer: Arc<dyn Mailer>,
    pub gateway: Arc<dyn PaymentGateway>,
}

/// Register the executor for every queue with the job queue client.
pub async fn register_all_executors(
    client: &JobQueueClient,
    deps: JobDependencies,
) -> Result<(), JobQueueError> {
    let queues = QueueService::new(client.clone());
    client
        .register_executor(OrderProcessingExecutor::new(deps.db.clone(), queues.clone()))
        .await?;
    client
        .register_executor(EmailNotificationExecutor::new(deps.mailer))
        .await?;
    client
        .register_executor(PaymentProcessingExecutor::new(deps.db, queues, deps.gateway))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bharatmart_db::backends::SqliteAdapter;
    use bharatmart_db::models::{OrderStatus, PaymentStatus};
    use bharatmart_db::repo::{orders, payments};
    use bharatmart_db::{DbConnectionConfig, Record};
    use bharatmart_job_queue::{JobStatus, QueueName};
    use serde_json::{json, Value};

    use super::*;

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> (JobQueueClient, Arc<dyn DatabaseAdapter>) {
        let adapter = SqliteAdapter::new(DbConnectionConfig::new("sqlite::memory:"));
        adapter.initialize().await.unwrap();
        let db: Arc<dyn DatabaseAdapter> = Arc::new(adapter);
        db.insert(
            "users",
            rec(json!({ "id": "u1", "email": "u1@example.com", "password": "x", "role": "customer" })),
        )
        .await
        .unwrap();
        db.insert(
            "orders",
            rec(json!({
                "id": "o1",
                "user_id": "u1",
                "status": "pending",
                "total_amount": 100.0,
                "payment_status": "pending"
            })),
        )
        .await
        .unwrap();

        let client = JobQueueClient::in_memory();
        register_all_executors(
            &client,
            JobDependencies {
                db: db.clone(),
                mailer: Arc::new(LogMailer::new(Duration::ZERO)),
                gateway: Arc::new(SimulatedGateway),
            },
        )
        .await
        .unwrap();
        (client, db)
    }

    #[tokio::test]
    async fn order_job_completes_and_queues_confirmation() {
        let (client, db) = seeded().await;
        let payload = json!({
            "orderId": "o1",
            "userId": "u1",
            "totalAmount": 100,
            "items": [{ "productId": "p1", "quantity": 2, "price": 50 }]
        });
        let handle = client
            .enqueue(QueueName::OrderProcessing, payload.clone())
            .await
            .unwrap();

        let job = client.process_next(QueueName::OrderProcessing).await.unwrap().unwrap();
        assert_eq!(job.id, handle.job_id);
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.payload, payload);
        assert_eq!(job.return_value.unwrap()["status"], "confirmed");

        let order = orders::get(db.as_ref(), "o1").await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let email = client
            .process_next(QueueName::EmailNotifications)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(email.payload["type"], "order_confirmation");
        assert_eq!(email.payload["to"], "u1@example.com");
        assert_eq!(email.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn missing_order_is_retried() {
        let (client, _db) = seeded().await;
        client
            .enqueue(
                QueueName::OrderProcessing,
                json!({ "orderId": "o404", "userId": "u1", "totalAmount": 1, "items": [] }),
            )
            .await
            .unwrap();
        let job = client.process_next(QueueName::OrderProcessing).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Delayed);
        assert!(job.failed_reason.unwrap().contains("order o404 not found"));
    }

    #[tokio::test]
    async fn payment_settles_order_and_emails_receipt() {
        let (client, db) = seeded().await;
        let queues = QueueService::new(client.clone());
        queues
            .add_payment(&PaymentProcessingJob {
                order_id: "o1".into(),
                amount: 100.0,
                payment_method: "upi".into(),
                user_id: "u1".into(),
            })
            .await
            .unwrap();

        let job = client.process_next(QueueName::PaymentProcessing).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let result = job.return_value.unwrap();
        assert_eq!(result["success"], true);

        let order = orders::get(db.as_ref(), "o1").await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Completed);
        let recorded = payments::list_for_order(db.as_ref(), "o1").await.unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].transaction_id.as_deref(), result["transactionId"].as_str());

        let email = client
            .process_next(QueueName::EmailNotifications)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(email.payload["type"], "payment_success");
        assert_eq!(email.priority, 3);
    }

    #[tokio::test]
    async fn mismatched_amount_records_failure_and_urgent_email() {
        let (client, db) = seeded().await;
        let queues = QueueService::new(client.clone());
        queues
            .add_payment(&PaymentProcessingJob {
                order_id: "o1".into(),
                amount: 1.0,
                payment_method: "card".into(),
                user_id: "u1".into(),
            })
            .await
            .unwrap();

        let job = client.process_next(QueueName::PaymentProcessing).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.return_value.unwrap()["success"], false);

        let order = orders::get(db.as_ref(), "o1").await.unwrap().unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Failed);

        let stats = queues.stats().await.unwrap();
        assert_eq!(stats.emails.waiting, 1);
        let email = client
            .process_next(QueueName::EmailNotifications)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(email.payload["type"], "payment_failed");
        assert_eq!(email.priority, 2);
    }
}
