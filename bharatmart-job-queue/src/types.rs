//! Core types for the job queue system.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::JobQueueError;

/// Upper bound for any computed retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Recorded on jobs recovered from a claim that never finished.
pub const STALLED_REASON: &str = "job stalled: claimed but no outcome was recorded";

/// The three work queues the application runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueName {
    OrderProcessing,
    EmailNotifications,
    PaymentProcessing,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [
        QueueName::OrderProcessing,
        QueueName::EmailNotifications,
        QueueName::PaymentProcessing,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderProcessing => "order-processing",
            Self::EmailNotifications => "email-notifications",
            Self::PaymentProcessing => "payment-processing",
        }
    }

    /// Default retry, priority and retention policy for this queue.
    pub const fn default_policy(self) -> QueuePolicy {
        match self {
            Self::OrderProcessing => QueuePolicy {
                max_attempts: 3,
                backoff: Backoff::Exponential { base_ms: 2000 },
                default_priority: 1,
                keep_completed: 100,
                keep_failed: 50,
            },
            Self::EmailNotifications => QueuePolicy {
                max_attempts: 5,
                backoff: Backoff::Exponential { base_ms: 1000 },
                default_priority: 3,
                keep_completed: 50,
                keep_failed: 25,
            },
            Self::PaymentProcessing => QueuePolicy {
                max_attempts: 3,
                backoff: Backoff::Fixed { delay_ms: 5000 },
                default_priority: 1,
                keep_completed: 100,
                keep_failed: 50,
            },
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = JobQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| JobQueueError::UnknownQueue(s.to_owned()))
    }
}

/// Delay strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Backoff {
    Exponential { base_ms: u64 },
    Fixed { delay_ms: u64 },
}

impl Backoff {
    /// Delay before the retry that follows failed attempt number `attempt`
    /// (1-based). Exponential delays double each time and are capped at
    /// [`MAX_BACKOFF`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed { delay_ms } => Duration::from_millis(delay_ms),
            Backoff::Exponential { base_ms } => {
                let exp = attempt.saturating_sub(1).min(32);
                let ms = base_ms.saturating_mul(1u64 << exp);
                Duration::from_millis(ms).min(MAX_BACKOFF)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    /// Lower is served first.
    pub default_priority: u32,
    pub keep_completed: usize,
    pub keep_failed: usize,
}

/// Per-enqueue overrides.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobOptions {
    pub priority: Option<u32>,
    pub delay: Option<Duration>,
}

impl JobOptions {
    pub fn priority(priority: u32) -> Self {
        Self {
            priority: Some(priority),
            delay: None,
        }
    }
}

/// Result returned after a job has been enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResult {
    pub job_id: Uuid,
    pub queue: QueueName,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Delayed,
    Completed,
    Failed,
}

impl JobStatus {
    /// Returns true if this status represents a terminal state.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Delayed => "delayed",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// A unit of background work and everything recorded about its execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub queue: QueueName,
    pub payload: Value,
    pub priority: u32,
    pub status: JobStatus,
    /// Attempts started so far.
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub progress: u8,
    pub return_value: Option<Value>,
    pub failed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// When a delayed job becomes eligible again.
    pub run_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(queue: QueueName, payload: Value, priority: u32, max_attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue,
            payload,
            priority,
            status: JobStatus::Waiting,
            attempts_made: 0,
            max_attempts,
            progress: 0,
            return_value: None,
            failed_reason: None,
            created_at: Utc::now(),
            processed_at: None,
            finished_at: None,
            run_at: None,
        }
    }

    #[inline]
    pub fn start(&mut self) {
        self.status = JobStatus::Active;
        self.attempts_made += 1;
        self.processed_at = Some(Utc::now());
        self.run_at = None;
    }

    #[inline]
    pub fn complete(&mut self, value: Value) {
        self.status = JobStatus::Completed;
        self.return_value = Some(value);
        self.failed_reason = None;
        self.finished_at = Some(Utc::now());
    }

    #[inline]
    pub fn delay(&mut self, reason: impl Into<String>, delay: Duration) {
        self.status = JobStatus::Delayed;
        self.failed_reason = Some(reason.into());
        self.run_at = Some(Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64));
    }

    #[inline]
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.failed_reason = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }

    /// Put a claimed job whose worker never reported back into waiting.
    /// The lost attempt still counts.
    #[inline]
    pub fn requeue_stalled(&mut self) {
        self.status = JobStatus::Waiting;
        self.progress = 0;
        self.failed_reason = Some(STALLED_REASON.to_owned());
        self.run_at = None;
    }

    /// Whether another attempt is allowed after the current one failed.
    #[inline]
    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.max_attempts
    }
}

/// Job counts per state for one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub completed: u64,
    pub failed: u64,
}
