use std::fmt;
use std::future::Future;

use crate::concurrency::cancel::CancelRx;
use crate::error::CoordResult;

/// Position of a worker inside its pool, from `0` to `worker_count - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Information handed to a job handler together with each job.
#[derive(Debug, Clone)]
pub struct JobContext {
    worker_id: WorkerId,
    cancel: CancelRx,
}

impl JobContext {
    pub(crate) fn new(worker_id: WorkerId, cancel: CancelRx) -> Self {
        Self { worker_id, cancel }
    }

    /// Returns the worker running the job.
    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    /// Returns the pool's cancellation signal.
    ///
    /// Long-running jobs should race their work against [`CancelRx::cancelled`] so that
    /// cancelling the pool does not wait for them to finish on their own.
    pub fn cancel(&self) -> &CancelRx {
        &self.cancel
    }

    /// Returns whether the pool has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Processes jobs taken from a worker pool queue.
///
/// A handler is shared by every worker of the pool, so it is invoked concurrently. Returning an
/// error marks the job as failed; the worker logs it and moves on to the next job. Any
/// `Fn(J, JobContext) -> Future<Output = CoordResult<()>>` closure is a handler.
pub trait JobHandler<J>: Send + Sync + 'static {
    /// Processes one job.
    fn handle(&self, job: J, context: JobContext) -> impl Future<Output = CoordResult<()>> + Send;
}

impl<J, F, Fut> JobHandler<J> for F
where
    F: Fn(J, JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CoordResult<()>> + Send,
{
    fn handle(&self, job: J, context: JobContext) -> impl Future<Output = CoordResult<()>> + Send {
        self(job, context)
    }
}
