//! Producer and consumer entry point for the named queues.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::{InMemoryBroker, QueueBroker};
use crate::error::JobQueueError;
use crate::executor::{JobContext, JobExecutor};
use crate::types::{EnqueueResult, Job, JobOptions, JobStatus, QueueName, QueuePolicy, QueueStats};

pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Interface for enqueuing jobs and driving their execution.
#[derive(Clone)]
pub struct JobQueueClient {
    broker: Arc<dyn QueueBroker>,
    policies: Arc<HashMap<QueueName, QueuePolicy>>,
    executors: Arc<RwLock<HashMap<QueueName, Arc<dyn JobExecutor>>>>,
    job_timeout: Duration,
}

impl fmt::Debug for JobQueueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueueClient")
            .field("broker", &self.broker.name())
            .field("policies", &self.policies)
            .field("executors", &"<RwLock<HashMap<QueueName, Arc<dyn JobExecutor>>>>")
            .field("job_timeout", &self.job_timeout)
            .finish()
    }
}

impl Default for JobQueueClient {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl JobQueueClient {
    pub fn new(broker: Arc<dyn QueueBroker>) -> Self {
        let policies = QueueName::ALL
            .into_iter()
            .map(|q| (q, q.default_policy()))
            .collect();
        Self {
            broker,
            policies: Arc::new(policies),
            executors: Arc::new(RwLock::new(HashMap::new())),
            job_timeout: DEFAULT_JOB_TIMEOUT,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBroker::new()))
    }

    /// Override one queue's policy. Call before the client is shared.
    pub fn with_policy(mut self, queue: QueueName, policy: QueuePolicy) -> Self {
        Arc::make_mut(&mut self.policies).insert(queue, policy);
        self
    }

    /// Upper bound on a single execution attempt.
    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn broker_name(&self) -> &'static str {
        self.broker.name()
    }

    pub fn policy(&self, queue: QueueName) -> QueuePolicy {
        self.policies
            .get(&queue)
            .copied()
            .unwrap_or_else(|| queue.default_policy())
    }

    /// Register the executor for its queue. Each queue has exactly one.
    pub async fn register_executor<E: JobExecutor + 'static>(&self, executor: E) -> Result<(), JobQueueError> {
        let queue = executor.queue();
        let mut executors = self.executors.write().await;
        if executors.contains_key(&queue) {
            return Err(JobQueueError::ExecutorExists(queue));
        }
        executors.insert(queue, Arc::new(executor));
        debug!(queue = %queue, "executor registered");
        Ok(())
    }

    pub async fn has_executor(&self, queue: QueueName) -> bool {
        self.executors.read().await.contains_key(&queue)
    }

    /// Enqueue with the queue's default priority.
    pub async fn enqueue(&self, queue: QueueName, payload: Value) -> Result<EnqueueResult, JobQueueError> {
        self.enqueue_with(queue, payload, JobOptions::default()).await
    }

    /// Enqueue a job and return as soon as the broker has stored it.
    pub async fn enqueue_with(
        &self,
        queue: QueueName,
        payload: Value,
        options: JobOptions,
    ) -> Result<EnqueueResult, JobQueueError> {
        let policy = self.policy(queue);
        let priority = options.priority.unwrap_or(policy.default_priority);
        let mut job = Job::new(queue, payload, priority, policy.max_attempts);
        if let Some(delay) = options.delay.filter(|d| !d.is_zero()) {
            job.run_at = Some(Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64));
        }
        let job_id = job.id;
        if let Err(err) = self.broker.push(job).await {
            error!(queue = %queue, error = %err, "failed to enqueue job");
            return Err(err);
        }
        info!(queue = %queue, job_id = %job_id, priority, "job enqueued");
        Ok(EnqueueResult { job_id, queue })
    }

    pub async fn get_job(&self, queue: QueueName, id: Uuid) -> Result<Option<Job>, JobQueueError> {
        self.broker.get(queue, id).await
    }

    /// Recently finished jobs, newest first.
    pub async fn recent(&self, queue: QueueName, status: JobStatus, limit: usize) -> Result<Vec<Job>, JobQueueError> {
        self.broker.recent(queue, status, limit).await
    }

    pub async fn stats(&self, queue: QueueName) -> Result<QueueStats, JobQueueError> {
        self.broker.stats(queue).await
    }

    /// Counts for every queue, keyed by queue name.
    pub async fn all_stats(&self) -> Result<BTreeMap<QueueName, QueueStats>, JobQueueError> {
        let mut out = BTreeMap::new();
        for queue in QueueName::ALL {
            out.insert(queue, self.broker.stats(queue).await?);
        }
        Ok(out)
    }

    pub async fn ping(&self) -> Result<(), JobQueueError> {
        self.broker.ping().await
    }

    /// How long a claim may go without an outcome before it counts as stalled.
    #[inline]
    pub fn stall_after(&self) -> Duration {
        self.job_timeout.saturating_mul(2)
    }

    /// Take back jobs whose worker claimed them and never recorded an
    /// outcome, for example after a crash or a broker error mid-job.
    /// Returns how many were recovered.
    pub async fn recover_stalled(&self, queue: QueueName) -> Result<usize, JobQueueError> {
        let Some(cutoff) = chrono::Duration::from_std(self.stall_after())
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let recovered = self
            .broker
            .recover_stalled(queue, cutoff, self.policy(queue).keep_failed)
            .await?;
        for job in &recovered {
            warn!(
                queue = %queue,
                job_id = %job.id,
                attempts = job.attempts_made,
                status = %job.status,
                "stalled job recovered"
            );
        }
        Ok(recovered.len())
    }

    /// Claim and run at most one job from `queue`.
    ///
    /// Executor errors and timeouts become retry or failure transitions and
    /// are not returned; only broker errors are. A payload that does not
    /// decode fails without retrying. Stalled claims are recovered first.
    /// Returns the job in the state it was left in, or `None` when nothing
    /// was ready.
    pub async fn process_next(&self, queue: QueueName) -> Result<Option<Job>, JobQueueError> {
        self.recover_stalled(queue).await?;
        let Some(mut job) = self.broker.pop(queue).await? else {
            return Ok(None);
        };
        let policy = self.policy(queue);
        let executor = self.executors.read().await.get(&queue).cloned();

        let ctx = JobContext::new(job.clone(), Arc::clone(&self.broker));
        let outcome = match executor {
            Some(executor) => match tokio::time::timeout(self.job_timeout, executor.execute(&ctx)).await {
                Ok(result) => result,
                Err(_) => Err(JobQueueError::Timeout(self.job_timeout.as_millis() as u64)),
            },
            None => Err(JobQueueError::ExecutionFailed(format!(
                "no executor registered for {queue}"
            ))),
        };
        job.progress = ctx.last_progress();

        match outcome {
            Ok(value) => {
                job.complete(value);
                info!(queue = %queue, job_id = %job.id, attempt = job.attempts_made, "job completed");
                self.broker.complete(job.clone(), policy.keep_completed).await?;
            }
            Err(err) if err.is_retryable() && job.can_retry() => {
                let delay = policy.backoff.delay_for(job.attempts_made);
                warn!(
                    queue = %queue,
                    job_id = %job.id,
                    attempt = job.attempts_made,
                    max_attempts = job.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "job attempt failed; retrying"
                );
                job.delay(err.to_string(), delay);
                self.broker.retry(job.clone(), delay).await?;
            }
            Err(err) => {
                error!(
                    queue = %queue,
                    job_id = %job.id,
                    attempts = job.attempts_made,
                    error = %err,
                    "job failed permanently"
                );
                job.fail(err.to_string());
                self.broker.fail(job.clone(), policy.keep_failed).await?;
            }
        }
        Ok(Some(job))
    }
}
