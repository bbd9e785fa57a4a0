//! Bounded worker pool for bulk indexing.
//!
//! A fixed set of workers pulls tasks from a shared queue and runs a
//! blocking handler for each, reporting every outcome on a results
//! channel. Submission blocks once the queue is full, so the producer can
//! never outrun the workers by more than the queue depth.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SyncError;

/// One unit of work: a source file to index.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub path: PathBuf,
}

/// Outcome of a task. Exactly one result is produced per submitted task.
#[derive(Debug)]
pub struct TaskResult {
    pub task: Task,
    pub error: Option<SyncError>,
}

impl TaskResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// The per-task work function. Runs on the blocking thread pool.
pub type Handler = Arc<dyn Fn(Task) -> Result<(), SyncError> + Send + Sync>;

const TASK_QUEUE_DEPTH: usize = 1;
const RESULT_BUFFER: usize = 64;

/// Fixed-size worker pool. Dropping results on the floor stalls the
/// workers once the result buffer fills, so the receiver returned by
/// [`WorkerPool::new`] must be drained while tasks are in flight.
pub struct WorkerPool {
    tx: mpsc::Sender<Task>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` workers running `handler`. Returns the pool and the
    /// receiver carrying one [`TaskResult`] per submitted task; the
    /// receiver closes once [`WorkerPool::stop`] has let every worker
    /// finish.
    pub fn new(workers: usize, handler: Handler) -> (Self, mpsc::Receiver<TaskResult>) {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<Task>(TASK_QUEUE_DEPTH);
        let (results_tx, results_rx) = mpsc::channel::<TaskResult>(RESULT_BUFFER);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let handler = Arc::clone(&handler);
                let results_tx = results_tx.clone();
                tokio::spawn(async move {
                    loop {
                        // Hold the queue lock only while receiving, never
                        // while the handler runs.
                        let task = {
                            let mut rx = rx.lock().await;
                            match rx.recv().await {
                                Some(task) => task,
                                None => break,
                            }
                        };
                        debug!(worker, id = %task.id, "Worker picked up task");

                        let handler = Arc::clone(&handler);
                        let input = task.clone();
                        let error =
                            match tokio::task::spawn_blocking(move || handler(input)).await {
                                Ok(Ok(())) => None,
                                Ok(Err(e)) => Some(e),
                                Err(e) => Some(SyncError::Worker(e.to_string())),
                            };
                        if results_tx.send(TaskResult { task, error }).await.is_err() {
                            break;
                        }
                    }
                    debug!(worker, "Worker exiting");
                })
            })
            .collect();

        (
            Self {
                tx,
                workers: handles,
            },
            results_rx,
        )
    }

    /// Queue a task, blocking while the queue is full.
    pub async fn submit(&self, task: Task) -> Result<(), SyncError> {
        self.tx.send(task).await.map_err(|_| SyncError::PoolClosed)
    }

    /// Close the queue and wait for every in-flight task to finish. The
    /// results channel closes once the last worker is done.
    pub async fn stop(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}
