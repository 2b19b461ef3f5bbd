use crate::domain::CancelToken;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("task '{0}' was cancelled before it started")]
    Cancelled(String),

    #[error("task '{0}' panicked")]
    Panicked(String),

    #[error("task '{0}' was dropped by the queue")]
    Disconnected(String),

    #[error("could not start worker pool: {0}")]
    Pool(String),
}

enum Completion<T> {
    Done(T),
    Skipped,
    Panicked,
}

/// Handle to a submitted task: cancel it or wait for its result.
pub struct TaskHandle<T> {
    label: String,
    cancel: CancelToken,
    result: Receiver<Completion<T>>,
}

impl<T> TaskHandle<T> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn wait(self) -> Result<T, TaskError> {
        match self.result.recv() {
            Ok(Completion::Done(value)) => Ok(value),
            Ok(Completion::Skipped) => Err(TaskError::Cancelled(self.label)),
            Ok(Completion::Panicked) => Err(TaskError::Panicked(self.label)),
            Err(_) => Err(TaskError::Disconnected(self.label)),
        }
    }
}

/// Bounded pool that runs submitted jobs off the caller's thread.
pub struct TaskQueue {
    pool: ThreadPool,
}

impl TaskQueue {
    pub fn new(workers: usize) -> Result<Self, TaskError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|id| format!("juno-worker-{id}"))
            .build()
            .map_err(|e| TaskError::Pool(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues `job`; it receives the handle's cancellation token.
    pub fn submit<T, F>(&self, label: impl Into<String>, job: F) -> TaskHandle<T>
    where
        T: Send + 'static,
        F: FnOnce(&CancelToken) -> T + Send + 'static,
    {
        let label = label.into();
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();

        let token = cancel.clone();
        let job_label = label.clone();
        self.pool.spawn(move || {
            if token.is_cancelled() {
                debug!("skipping cancelled task '{}'", job_label);
                let _ = tx.send(Completion::Skipped);
                return;
            }

            // rayon aborts the process on an unhandled panic in a spawned job.
            let completion = match panic::catch_unwind(AssertUnwindSafe(|| job(&token))) {
                Ok(value) => Completion::Done(value),
                Err(_) => {
                    error!("task '{}' panicked", job_label);
                    Completion::Panicked
                }
            };
            let _ = tx.send(completion);
        });

        TaskHandle {
            label,
            cancel,
            result: rx,
        }
    }
}
