//! Polling workers, one task per queue.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::client::JobQueueClient;
use crate::types::QueueName;

/// Longest pause between polls while the broker is unreachable.
const MAX_OUTAGE_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct WorkerOptions {
    /// Pause after finding a queue empty.
    pub poll_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Handle to the running workers.
#[derive(Debug)]
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn one worker per queue.
    pub fn start(client: JobQueueClient, queues: &[QueueName], options: WorkerOptions) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handles = queues
            .iter()
            .map(|&queue| {
                let worker = Worker {
                    client: client.clone(),
                    queue,
                    options,
                    shutdown: rx.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        info!(queues = queues.len(), "job workers started");
        Self { shutdown, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop polling and wait for in-flight jobs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "job worker panicked");
            }
        }
        info!("job workers stopped");
    }
}

struct Worker {
    client: JobQueueClient,
    queue: QueueName,
    options: WorkerOptions,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        info!(queue = %self.queue, "worker polling");
        let mut outage = Duration::ZERO;
        loop {
            if *self.shutdown.borrow() {
                break;
            }
            let pause = match self.client.process_next(self.queue).await {
                Ok(Some(_)) => {
                    outage = Duration::ZERO;
                    continue;
                }
                Ok(None) => {
                    outage = Duration::ZERO;
                    self.options.poll_interval
                }
                Err(err) if err.is_unavailable() => {
                    outage = (outage * 2)
                        .max(self.options.poll_interval)
                        .min(MAX_OUTAGE_BACKOFF);
                    warn!(queue = %self.queue, error = %err, retry_in_ms = outage.as_millis() as u64, "queue broker unavailable");
                    outage
                }
                Err(err) => {
                    error!(queue = %self.queue, error = %err, "worker poll failed");
                    self.options.poll_interval
                }
            };
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.shutdown.changed() => {}
            }
        }
        info!(queue = %self.queue, "worker stopped");
    }
}
