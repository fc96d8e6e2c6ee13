//! Redis-backed broker shared by every API and worker process.
//!
//! Per queue, under `{prefix}{queue}:`:
//! - `waiting`  sorted set, score = priority * 1e12 + sequence
//! - `delayed`  sorted set, score = ready-at unix millis
//! - `active`   set of claimed ids
//! - `completed` / `failed` lists, newest at the head, trimmed to the keep bound
//! - `job:{id}` the JSON-encoded [`Job`]
//! - `seq` enqueue counter

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::QueueBroker;
use crate::error::JobQueueError;
use crate::types::{Job, JobStatus, QueueName, QueueStats, STALLED_REASON};

pub const DEFAULT_QUEUE_PREFIX: &str = "bharatmart:queue:";

const PRIORITY_SCALE: f64 = 1e12;

#[derive(Debug, Clone)]
struct QueueKeys {
    waiting: String,
    delayed: String,
    active: String,
    completed: String,
    failed: String,
    seq: String,
    job_prefix: String,
}

impl QueueKeys {
    fn job(&self, id: impl std::fmt::Display) -> String {
        format!("{}{}", self.job_prefix, id)
    }

    fn history(&self, status: JobStatus) -> &str {
        match status {
            JobStatus::Failed => &self.failed,
            _ => &self.completed,
        }
    }
}

#[inline]
fn waiting_score(priority: u32, seq: u64) -> f64 {
    priority as f64 * PRIORITY_SCALE + seq as f64
}

fn decode(raw: &str) -> Result<Job, JobQueueError> {
    Ok(serde_json::from_str(raw)?)
}

pub struct RedisBroker {
    client: redis::Client,
    conn: Mutex<Option<MultiplexedConnection>>,
    prefix: String,
    timeout: Duration,
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RedisBroker {
    /// Parse the URL without connecting; the connection is opened on first use.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, JobQueueError> {
        let client = redis::Client::open(url).map_err(|e| JobQueueError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            prefix: DEFAULT_QUEUE_PREFIX.to_owned(),
            timeout,
        })
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn keys(&self, queue: QueueName) -> QueueKeys {
        let base = format!("{}{}:", self.prefix, queue.as_str());
        QueueKeys {
            waiting: format!("{base}waiting"),
            delayed: format!("{base}delayed"),
            active: format!("{base}active"),
            completed: format!("{base}completed"),
            failed: format!("{base}failed"),
            seq: format!("{base}seq"),
            job_prefix: format!("{base}job:"),
        }
    }

    fn elapsed(&self) -> JobQueueError {
        JobQueueError::Unavailable(format!(
            "redis did not answer within {} ms",
            self.timeout.as_millis()
        ))
    }

    async fn connection(&self) -> Result<MultiplexedConnection, JobQueueError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = tokio::time::timeout(self.timeout, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| self.elapsed())?
            .map_err(|e| JobQueueError::Unavailable(e.to_string()))?;
        debug!(prefix = %self.prefix, "redis broker connected");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn run<T, F, Fut>(&self, op: F) -> Result<T, JobQueueError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = Result<T, JobQueueError>>,
    {
        let conn = self.connection().await?;
        let result = match tokio::time::timeout(self.timeout, op(conn)).await {
            Ok(result) => result,
            Err(_) => Err(self.elapsed()),
        };
        if let Err(err) = &result {
            if err.is_unavailable() {
                warn!(error = %err, "redis broker connection lost");
                self.conn.lock().await.take();
            }
        }
        result
    }

    /// Record a terminal job and trim its history list.
    async fn finish(&self, job: Job, keep: usize) -> Result<(), JobQueueError> {
        let keys = self.keys(job.queue);
        let id = job.id.to_string();
        let body = serde_json::to_string(&job)?;
        let status = job.status;
        self.run(|mut conn| async move {
            let history = keys.history(status).to_owned();
            redis::pipe()
                .atomic()
                .srem(&keys.active, &id)
                .ignore()
                .set(keys.job(&id), body)
                .ignore()
                .lpush(&history, &id)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;

            let overflow: Vec<String> = conn.lrange(&history, keep as isize, -1).await?;
            if !overflow.is_empty() {
                let mut pipe = redis::pipe();
                pipe.atomic();
                if keep == 0 {
                    pipe.del(&history).ignore();
                } else {
                    pipe.ltrim(&history, 0, keep as isize - 1).ignore();
                }
                let stale: Vec<String> = overflow.iter().map(|old| keys.job(old)).collect();
                pipe.del(stale).ignore();
                pipe.query_async::<()>(&mut conn).await?;
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl QueueBroker for RedisBroker {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn push(&self, mut job: Job) -> Result<(), JobQueueError> {
        let keys = self.keys(job.queue);
        self.run(|mut conn| async move {
            let seq: u64 = conn.incr(&keys.seq, 1u64).await?;
            let id = job.id.to_string();
            let delayed_until = job.run_at.filter(|at| *at > Utc::now());
            job.status = if delayed_until.is_some() {
                JobStatus::Delayed
            } else {
                JobStatus::Waiting
            };
            let body = serde_json::to_string(&job)?;
            let mut pipe = redis::pipe();
            pipe.atomic().set(keys.job(&id), body).ignore();
            match delayed_until {
                Some(at) => pipe.zadd(&keys.delayed, &id, at.timestamp_millis()).ignore(),
                None => pipe
                    .zadd(&keys.waiting, &id, waiting_score(job.priority, seq))
                    .ignore(),
            };
            pipe.query_async::<()>(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn pop(&self, queue: QueueName) -> Result<Option<Job>, JobQueueError> {
        let keys = self.keys(queue);
        self.run(|mut conn| async move {
            let now = Utc::now().timestamp_millis();
            let due: Vec<String> = conn.zrangebyscore(&keys.delayed, "-inf", now).await?;
            for id in due {
                // Only the process that removes the id promotes it.
                let removed: i64 = conn.zrem(&keys.delayed, &id).await?;
                if removed != 1 {
                    continue;
                }
                let raw: Option<String> = conn.get(keys.job(&id)).await?;
                let Some(raw) = raw else { continue };
                let mut job = decode(&raw)?;
                job.status = JobStatus::Waiting;
                job.run_at = None;
                let seq: u64 = conn.incr(&keys.seq, 1u64).await?;
                redis::pipe()
                    .atomic()
                    .set(keys.job(&id), serde_json::to_string(&job)?)
                    .ignore()
                    .zadd(&keys.waiting, &id, waiting_score(job.priority, seq))
                    .ignore()
                    .query_async::<()>(&mut conn)
                    .await?;
            }

            let popped: Vec<(String, f64)> = conn.zpopmin(&keys.waiting, 1).await?;
            let Some((id, _)) = popped.into_iter().next() else {
                return Ok(None);
            };
            let raw: Option<String> = conn.get(keys.job(&id)).await?;
            let Some(raw) = raw else {
                let uuid = Uuid::parse_str(&id).unwrap_or_default();
                return Err(JobQueueError::NotFound(uuid));
            };
            let mut job = decode(&raw)?;
            job.start();
            redis::pipe()
                .atomic()
                .sadd(&keys.active, &id)
                .ignore()
                .set(keys.job(&id), serde_json::to_string(&job)?)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            Ok(Some(job))
        })
        .await
    }

    async fn recover_stalled(
        &self,
        queue: QueueName,
        started_before: DateTime<Utc>,
        keep_failed: usize,
    ) -> Result<Vec<Job>, JobQueueError> {
        let keys = self.keys(queue);
        let recovered = self
            .run(|mut conn| async move {
                let ids: Vec<String> = conn.smembers(&keys.active).await?;
                let mut recovered = Vec::new();
                for id in ids {
                    let raw: Option<String> = conn.get(keys.job(&id)).await?;
                    let Some(raw) = raw else {
                        let _: i64 = conn.srem(&keys.active, &id).await?;
                        continue;
                    };
                    let mut job = decode(&raw)?;
                    if job.processed_at.is_some_and(|at| at >= started_before) {
                        continue;
                    }
                    // Only the process that removes the id recovers it.
                    let removed: i64 = conn.srem(&keys.active, &id).await?;
                    if removed != 1 {
                        continue;
                    }
                    if job.can_retry() {
                        job.requeue_stalled();
                        let seq: u64 = conn.incr(&keys.seq, 1u64).await?;
                        redis::pipe()
                            .atomic()
                            .set(keys.job(&id), serde_json::to_string(&job)?)
                            .ignore()
                            .zadd(&keys.waiting, &id, waiting_score(job.priority, seq))
                            .ignore()
                            .query_async::<()>(&mut conn)
                            .await?;
                    } else {
                        job.fail(STALLED_REASON);
                    }
                    recovered.push(job);
                }
                Ok(recovered)
            })
            .await?;

        for job in recovered.iter().filter(|j| j.status == JobStatus::Failed) {
            self.finish(job.clone(), keep_failed).await?;
        }
        Ok(recovered)
    }

    async fn set_progress(&self, queue: QueueName, id: Uuid, progress: u8) -> Result<(), JobQueueError> {
        let keys = self.keys(queue);
        self.run(|mut conn| async move {
            let key = keys.job(id);
            let raw: Option<String> = conn.get(&key).await?;
            if let Some(raw) = raw {
                let mut job = decode(&raw)?;
                job.progress = progress.min(100);
                let _: () = conn.set(&key, serde_json::to_string(&job)?).await?;
            }
            Ok(())
        })
        .await
    }

    async fn complete(&self, job: Job, keep: usize) -> Result<(), JobQueueError> {
        self.finish(job, keep).await
    }

    async fn retry(&self, mut job: Job, delay: Duration) -> Result<(), JobQueueError> {
        let keys = self.keys(job.queue);
        let at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
        job.status = JobStatus::Delayed;
        job.run_at = Some(at);
        let id = job.id.to_string();
        let body = serde_json::to_string(&job)?;
        self.run(|mut conn| async move {
            redis::pipe()
                .atomic()
                .srem(&keys.active, &id)
                .ignore()
                .set(keys.job(&id), body)
                .ignore()
                .zadd(&keys.delayed, &id, at.timestamp_millis())
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            Ok(())
        })
        .await
    }

    async fn fail(&self, job: Job, keep: usize) -> Result<(), JobQueueError> {
        self.finish(job, keep).await
    }

    async fn get(&self, queue: QueueName, id: Uuid) -> Result<Option<Job>, JobQueueError> {
        let keys = self.keys(queue);
        self.run(|mut conn| async move {
            let raw: Option<String> = conn.get(keys.job(id)).await?;
            raw.as_deref().map(decode).transpose()
        })
        .await
    }

    async fn recent(&self, queue: QueueName, status: JobStatus, limit: usize) -> Result<Vec<Job>, JobQueueError> {
        if limit == 0 || !status.is_terminal() {
            return Ok(Vec::new());
        }
        let keys = self.keys(queue);
        self.run(|mut conn| async move {
            let ids: Vec<String> = conn
                .lrange(keys.history(status), 0, limit as isize - 1)
                .await?;
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let job_keys: Vec<String> = ids.iter().map(|id| keys.job(id)).collect();
            let raws: Vec<Option<String>> = redis::cmd("MGET")
                .arg(&job_keys)
                .query_async(&mut conn)
                .await?;
            raws.into_iter()
                .flatten()
                .map(|raw| decode(&raw))
                .collect()
        })
        .await
    }

    async fn stats(&self, queue: QueueName) -> Result<QueueStats, JobQueueError> {
        let keys = self.keys(queue);
        self.run(|mut conn| async move {
            let (waiting, active, delayed, completed, failed): (u64, u64, u64, u64, u64) =
                redis::pipe()
                    .zcard(&keys.waiting)
                    .scard(&keys.active)
                    .zcard(&keys.delayed)
                    .llen(&keys.completed)
                    .llen(&keys.failed)
                    .query_async(&mut conn)
                    .await?;
            Ok(QueueStats {
                waiting,
                active,
                delayed,
                completed,
                failed,
            })
        })
        .await
    }

    async fn ping(&self) -> Result<(), JobQueueError> {
        self.run(|mut conn| async move {
            let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn waiting_score_orders_by_priority_then_sequence() {
        assert!(waiting_score(1, 999_999) < waiting_score(2, 1));
        assert!(waiting_score(3, 1) < waiting_score(3, 2));
    }

    #[test]
    fn key_layout() {
        let broker = RedisBroker::new("redis://127.0.0.1:6379", Duration::from_millis(50))
            .unwrap()
            .with_prefix("t:");
        let keys = broker.keys(QueueName::EmailNotifications);
        assert_eq!(keys.waiting, "t:email-notifications:waiting");
        assert_eq!(keys.job("abc"), "t:email-notifications:job:abc");
        assert_eq!(keys.history(JobStatus::Failed), "t:email-notifications:failed");
    }

    #[tokio::test]
    async fn unreachable_redis_is_unavailable() {
        let broker = RedisBroker::new("redis://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        let job = Job::new(QueueName::OrderProcessing, json!({}), 1, 3);
        let err = broker.push(job).await.unwrap_err();
        assert!(err.is_unavailable(), "{err}");
        assert!(broker.pop(QueueName::OrderProcessing).await.unwrap_err().is_unavailable());
    }
}
