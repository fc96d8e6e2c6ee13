//! Storage contract for queued jobs and the in-process implementation.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::JobQueueError;
use crate::types::{Job, JobStatus, QueueName, QueueStats, STALLED_REASON};

/// Where jobs live between enqueue and completion.
///
/// A broker owns the per-queue state machine storage: a priority-ordered
/// waiting set, a time-ordered delayed set, the active set, and bounded
/// completed/failed histories. [`QueueBroker::pop`] must hand a job to at
/// most one consumer.
#[async_trait]
pub trait QueueBroker: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Store a new job. Jobs with `run_at` in the future go to the delayed
    /// set, the rest are waiting.
    async fn push(&self, job: Job) -> Result<(), JobQueueError>;

    /// Promote due delayed jobs, then claim the best waiting job (lowest
    /// priority number, then oldest) and mark it active.
    async fn pop(&self, queue: QueueName) -> Result<Option<Job>, JobQueueError>;

    /// Take back active jobs claimed before `started_before`. Jobs with
    /// attempts left return to waiting, the rest are failed and kept up to
    /// `keep_failed`. Returns the recovered jobs in their new state.
    async fn recover_stalled(
        &self,
        queue: QueueName,
        started_before: DateTime<Utc>,
        keep_failed: usize,
    ) -> Result<Vec<Job>, JobQueueError>;

    async fn set_progress(&self, queue: QueueName, id: Uuid, progress: u8) -> Result<(), JobQueueError>;

    /// Move an active job to completed, keeping at most `keep` completed jobs.
    async fn complete(&self, job: Job, keep: usize) -> Result<(), JobQueueError>;

    /// Move an active job back to the delayed set for another attempt.
    async fn retry(&self, job: Job, delay: Duration) -> Result<(), JobQueueError>;

    /// Move an active job to failed, keeping at most `keep` failed jobs.
    async fn fail(&self, job: Job, keep: usize) -> Result<(), JobQueueError>;

    async fn get(&self, queue: QueueName, id: Uuid) -> Result<Option<Job>, JobQueueError>;

    /// Most recent jobs in a terminal state, newest first.
    async fn recent(&self, queue: QueueName, status: JobStatus, limit: usize) -> Result<Vec<Job>, JobQueueError>;

    async fn stats(&self, queue: QueueName) -> Result<QueueStats, JobQueueError>;

    async fn ping(&self) -> Result<(), JobQueueError>;
}

#[derive(Debug, Default)]
struct QueueState {
    seq: u64,
    /// (priority, sequence) -> id
    waiting: BTreeMap<(u32, u64), Uuid>,
    /// (ready at millis, sequence) -> id
    delayed: BTreeMap<(i64, u64), Uuid>,
    active: HashSet<Uuid>,
    /// Oldest first.
    completed: VecDeque<Uuid>,
    failed: VecDeque<Uuid>,
    jobs: HashMap<Uuid, Job>,
}

impl QueueState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn enqueue(&mut self, mut job: Job) {
        let seq = self.next_seq();
        match job.run_at {
            Some(at) if at > Utc::now() => {
                job.status = JobStatus::Delayed;
                self.delayed.insert((at.timestamp_millis(), seq), job.id);
            }
            _ => {
                job.status = JobStatus::Waiting;
                job.run_at = None;
                self.waiting.insert((job.priority, seq), job.id);
            }
        }
        self.jobs.insert(job.id, job);
    }

    fn promote_due(&mut self) {
        let now = Utc::now().timestamp_millis();
        let due: Vec<(i64, u64)> = self
            .delayed
            .range(..=(now, u64::MAX))
            .map(|(k, _)| *k)
            .collect();
        for key in due {
            if let Some(id) = self.delayed.remove(&key) {
                let seq = self.next_seq();
                if let Some(job) = self.jobs.get_mut(&id) {
                    job.status = JobStatus::Waiting;
                    job.run_at = None;
                    self.waiting.insert((job.priority, seq), id);
                }
            }
        }
    }

    fn finish(&mut self, job: Job, keep: usize) {
        self.active.remove(&job.id);
        let id = job.id;
        let history = match job.status {
            JobStatus::Failed => &mut self.failed,
            _ => &mut self.completed,
        };
        self.jobs.insert(id, job);
        history.push_back(id);
        while history.len() > keep {
            if let Some(old) = history.pop_front() {
                self.jobs.remove(&old);
            }
        }
    }
}

/// Process-local broker. Jobs do not survive a restart.
#[derive(Debug)]
pub struct InMemoryBroker {
    queues: Mutex<HashMap<QueueName, QueueState>>,
    available: AtomicBool,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate losing the broker. While unavailable every call fails with
    /// [`JobQueueError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), JobQueueError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(JobQueueError::Unavailable("in-memory broker offline".into()))
        }
    }
}

#[async_trait]
impl QueueBroker for InMemoryBroker {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn push(&self, job: Job) -> Result<(), JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        queues.entry(job.queue).or_default().enqueue(job);
        Ok(())
    }

    async fn pop(&self, queue: QueueName) -> Result<Option<Job>, JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(queue).or_default();
        state.promote_due();
        let Some((_, id)) = state.waiting.pop_first() else {
            return Ok(None);
        };
        state.active.insert(id);
        let Some(job) = state.jobs.get_mut(&id) else {
            return Err(JobQueueError::NotFound(id));
        };
        job.start();
        Ok(Some(job.clone()))
    }

    async fn recover_stalled(
        &self,
        queue: QueueName,
        started_before: DateTime<Utc>,
        keep_failed: usize,
    ) -> Result<Vec<Job>, JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        let Some(state) = queues.get_mut(&queue) else {
            return Ok(Vec::new());
        };
        let stalled: Vec<Uuid> = state
            .active
            .iter()
            .copied()
            .filter(|id| {
                state
                    .jobs
                    .get(id)
                    .is_some_and(|job| job.processed_at.is_none_or(|at| at < started_before))
            })
            .collect();

        let mut recovered = Vec::with_capacity(stalled.len());
        for id in stalled {
            state.active.remove(&id);
            let Some(mut job) = state.jobs.get(&id).cloned() else {
                continue;
            };
            if job.can_retry() {
                job.requeue_stalled();
                let seq = state.next_seq();
                state.waiting.insert((job.priority, seq), id);
                state.jobs.insert(id, job.clone());
            } else {
                job.fail(STALLED_REASON);
                state.finish(job.clone(), keep_failed);
            }
            recovered.push(job);
        }
        Ok(recovered)
    }

    async fn set_progress(&self, queue: QueueName, id: Uuid, progress: u8) -> Result<(), JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        if let Some(job) = queues.get_mut(&queue).and_then(|s| s.jobs.get_mut(&id)) {
            job.progress = progress.min(100);
        }
        Ok(())
    }

    async fn complete(&self, job: Job, keep: usize) -> Result<(), JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        queues.entry(job.queue).or_default().finish(job, keep);
        Ok(())
    }

    async fn retry(&self, mut job: Job, delay: Duration) -> Result<(), JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        let state = queues.entry(job.queue).or_default();
        state.active.remove(&job.id);
        let seq = state.next_seq();
        let at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
        job.status = JobStatus::Delayed;
        job.run_at = Some(at);
        state.delayed.insert((at.timestamp_millis(), seq), job.id);
        state.jobs.insert(job.id, job);
        Ok(())
    }

    async fn fail(&self, job: Job, keep: usize) -> Result<(), JobQueueError> {
        self.check()?;
        let mut queues = self.queues.lock().await;
        queues.entry(job.queue).or_default().finish(job, keep);
        Ok(())
    }

    async fn get(&self, queue: QueueName, id: Uuid) -> Result<Option<Job>, JobQueueError> {
        self.check()?;
        let queues = self.queues.lock().await;
        Ok(queues.get(&queue).and_then(|s| s.jobs.get(&id)).cloned())
    }

    async fn recent(&self, queue: QueueName, status: JobStatus, limit: usize) -> Result<Vec<Job>, JobQueueError> {
        self.check()?;
        let queues = self.queues.lock().await;
        let Some(state) = queues.get(&queue) else {
            return Ok(Vec::new());
        };
        let ids = match status {
            JobStatus::Completed => &state.completed,
            JobStatus::Failed => &state.failed,
            _ => return Ok(Vec::new()),
        };
        Ok(ids
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| state.jobs.get(id).cloned())
            .collect())
    }

    async fn stats(&self, queue: QueueName) -> Result<QueueStats, JobQueueError> {
        self.check()?;
        let queues = self.queues.lock().await;
        Ok(queues
            .get(&queue)
            .map(|s| QueueStats {
                waiting: s.waiting.len() as u64,
                active: s.active.len() as u64,
                delayed: s.delayed.len() as u64,
                completed: s.completed.len() as u64,
                failed: s.failed.len() as u64,
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), JobQueueError> {
        self.check()
    }
}
