//! Named background job queues.
//!
//! Three queues (`order-processing`, `email-notifications`,
//! `payment-processing`) each carry their own retry, priority and retention
//! policy. Producers enqueue and return immediately; workers claim jobs from
//! a [`QueueBroker`], run the queue's [`JobExecutor`] and record the outcome.
//!
//! # Architecture
//!
//! - [`JobQueueClient`] - enqueue, inspect and process jobs
//! - [`QueueBroker`] - job storage; [`InMemoryBroker`] or [`RedisBroker`]
//! - [`JobExecutor`] - one handler per queue, sees a [`JobContext`]
//! - [`WorkerPool`] - polling tasks with graceful shutdown
//!
//! # Example
//!
//! ```rust,no_run
//! use bharatmart_job_queue::{async_trait, JobContext, JobExecutor, JobQueueClient, JobQueueError, QueueName};
//! use serde_json::{json, Value};
//!
//! struct Confirm;
//!
//! #[async_trait]
//! impl JobExecutor for Confirm {
//!     fn queue(&self) -> QueueName {
//!         QueueName::OrderProcessing
//!     }
//!
//!     async fn execute(&self, ctx: &JobContext) -> Result<Value, JobQueueError> {
//!         ctx.progress(100).await;
//!         Ok(json!({ "orderId": ctx.payload()["orderId"] }))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), JobQueueError> {
//!     let client = JobQueueClient::in_memory();
//!     client.register_executor(Confirm).await?;
//!     let handle = client.enqueue(QueueName::OrderProcessing, json!({ "orderId": "o1" })).await?;
//!     client.process_next(QueueName::OrderProcessing).await?;
//!     println!("processed {}", handle.job_id);
//!     Ok(())
//! }
//! ```

mod broker;
mod client;
mod error;
mod executor;
mod redis_broker;
mod types;
mod worker;

pub use broker::{InMemoryBroker, QueueBroker};
pub use client::{JobQueueClient, DEFAULT_JOB_TIMEOUT};
pub use error::JobQueueError;
pub use executor::{JobContext, JobExecutor, NoOpExecutor};
pub use redis_broker::{RedisBroker, DEFAULT_QUEUE_PREFIX};
pub use types::{
    Backoff, EnqueueResult, Job, JobOptions, JobStatus, QueueName, QueuePolicy, QueueStats, MAX_BACKOFF,
    STALLED_REASON,
};
pub use worker::{WorkerOptions, WorkerPool};

// Re-export async_trait for convenience when implementing JobExecutor
pub use async_trait::async_trait;
