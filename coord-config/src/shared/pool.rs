use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Worker pool sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerPoolConfig {
    /// Number of workers consuming the job queue.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Jobs buffered before submitters wait. `None` makes the queue unbounded.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: Option<usize>,
}

impl WorkerPoolConfig {
    pub const DEFAULT_WORKER_COUNT: usize = 4;

    pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

    /// Creates a configuration with `worker_count` workers and the default queue capacity.
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Ensures there is at least one worker and, when bounded, room for at least one job.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.worker_count == 0 {
            return Err(ValidationError::must_be_positive("worker_pool.worker_count"));
        }

        if self.queue_capacity == Some(0) {
            return Err(ValidationError::must_be_positive(
                "worker_pool.queue_capacity",
            ));
        }

        Ok(())
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_worker_count() -> usize {
    WorkerPoolConfig::DEFAULT_WORKER_COUNT
}

fn default_queue_capacity() -> Option<usize> {
    Some(WorkerPoolConfig::DEFAULT_QUEUE_CAPACITY)
}
