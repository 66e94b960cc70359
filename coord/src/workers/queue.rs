use std::error::Error;
use std::fmt;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

use crate::concurrency::tracker::{CompletionTracker, TaskGuard};
use crate::coord_error;
use crate::error::{CoordError, ErrorKind};

/// A job waiting in the queue, together with its registration in the pool's pending count.
///
/// The registration is released when the job is dropped, whether it was processed, discarded,
/// or handed back to the submitter.
pub(crate) struct QueuedJob<J> {
    job: J,
    pending: TaskGuard,
}

impl<J> QueuedJob<J> {
    pub(crate) fn into_parts(self) -> (J, TaskGuard) {
        (self.job, self.pending)
    }
}

/// Error returned when a job cannot be queued. The job is handed back.
pub enum SubmitError<J> {
    /// The pool was stopped or cancelled.
    Closed(J),
    /// The queue is at capacity. Only returned by non-waiting submissions.
    Full(J),
}

impl<J> SubmitError<J> {
    /// Returns the rejected job.
    pub fn into_job(self) -> J {
        match self {
            SubmitError::Closed(job) | SubmitError::Full(job) => job,
        }
    }

    /// Returns whether the job was refused because the pool is shutting down.
    pub fn is_closed(&self) -> bool {
        matches!(self, SubmitError::Closed(_))
    }
}

impl<J> fmt::Debug for SubmitError<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Closed(_) => f.write_str("Closed(..)"),
            SubmitError::Full(_) => f.write_str("Full(..)"),
        }
    }
}

impl<J> fmt::Display for SubmitError<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::Closed(_) => f.write_str("job queue is closed"),
            SubmitError::Full(_) => f.write_str("job queue is full"),
        }
    }
}

impl<J> Error for SubmitError<J> {}

/// Converts a rejected submission into [`ErrorKind::QueueClosed`] or [`ErrorKind::QueueFull`],
/// dropping the job.
impl<J> From<SubmitError<J>> for CoordError {
    #[track_caller]
    fn from(err: SubmitError<J>) -> CoordError {
        match err {
            SubmitError::Closed(_) => {
                coord_error!(ErrorKind::QueueClosed, "Job submitted to a stopped pool")
            }
            SubmitError::Full(_) => {
                coord_error!(ErrorKind::QueueFull, "Job queue is at capacity")
            }
        }
    }
}

enum QueueTx<J> {
    Bounded(mpsc::Sender<QueuedJob<J>>),
    Unbounded(mpsc::UnboundedSender<QueuedJob<J>>),
}

impl<J> Clone for QueueTx<J> {
    fn clone(&self) -> Self {
        match self {
            QueueTx::Bounded(tx) => QueueTx::Bounded(tx.clone()),
            QueueTx::Unbounded(tx) => QueueTx::Unbounded(tx.clone()),
        }
    }
}

enum QueueRx<J> {
    Bounded(mpsc::Receiver<QueuedJob<J>>),
    Unbounded(mpsc::UnboundedReceiver<QueuedJob<J>>),
}

/// Submitting side of a worker pool queue.
///
/// Cloning returns another submitter for the same pool.
pub struct JobSender<J> {
    tx: QueueTx<J>,
    pending: CompletionTracker,
}

impl<J> JobSender<J> {
    /// Queues `job`, waiting for room when the queue is bounded and full.
    ///
    /// Fails with [`SubmitError::Closed`] once the pool is stopping.
    pub async fn submit(&self, job: J) -> Result<(), SubmitError<J>> {
        let queued = QueuedJob {
            job,
            pending: self.pending.track(),
        };

        match &self.tx {
            QueueTx::Bounded(tx) => tx
                .send(queued)
                .await
                .map_err(|err| SubmitError::Closed(err.0.job)),
            QueueTx::Unbounded(tx) => tx
                .send(queued)
                .map_err(|err| SubmitError::Closed(err.0.job)),
        }
    }

    /// Queues `job` only if there is room right now.
    pub fn try_submit(&self, job: J) -> Result<(), SubmitError<J>> {
        let queued = QueuedJob {
            job,
            pending: self.pending.track(),
        };

        match &self.tx {
            QueueTx::Bounded(tx) => tx.try_send(queued).map_err(|err| match err {
                TrySendError::Full(queued) => SubmitError::Full(queued.job),
                TrySendError::Closed(queued) => SubmitError::Closed(queued.job),
            }),
            QueueTx::Unbounded(tx) => tx
                .send(queued)
                .map_err(|err| SubmitError::Closed(err.0.job)),
        }
    }

    /// Returns whether the queue stopped accepting jobs.
    pub fn is_closed(&self) -> bool {
        match &self.tx {
            QueueTx::Bounded(tx) => tx.is_closed(),
            QueueTx::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl<J> Clone for JobSender<J> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<J> fmt::Debug for JobSender<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSender")
            .field("closed", &self.is_closed())
            .field("pending", &self.pending.outstanding())
            .finish()
    }
}

/// Receiving side of a worker pool queue, shared by the workers behind a mutex.
pub(crate) struct JobReceiver<J> {
    rx: QueueRx<J>,
    closed: bool,
}

impl<J> JobReceiver<J> {
    /// Waits for the next job. Returns [`None`] once the queue is closed and empty.
    pub(crate) async fn recv(&mut self) -> Option<QueuedJob<J>> {
        match &mut self.rx {
            QueueRx::Bounded(rx) => rx.recv().await,
            QueueRx::Unbounded(rx) => rx.recv().await,
        }
    }

    pub(crate) fn try_recv(&mut self) -> Option<QueuedJob<J>> {
        let result = match &mut self.rx {
            QueueRx::Bounded(rx) => rx.try_recv(),
            QueueRx::Unbounded(rx) => rx.try_recv(),
        };

        match result {
            Ok(queued) => Some(queued),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Rejects further submissions. Jobs already queued can still be received.
    pub(crate) fn close(&mut self) {
        match &mut self.rx {
            QueueRx::Bounded(rx) => rx.close(),
            QueueRx::Unbounded(rx) => rx.close(),
        }
        self.closed = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Creates a job queue. `capacity` of `None` makes it unbounded.
///
/// Every submitted job is registered with `pending` until it is dropped.
pub(crate) fn job_queue<J>(
    capacity: Option<usize>,
    pending: CompletionTracker,
) -> (JobSender<J>, JobReceiver<J>) {
    let (tx, rx) = match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (QueueTx::Bounded(tx), QueueRx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (QueueTx::Unbounded(tx), QueueRx::Unbounded(rx))
        }
    };

    (
        JobSender { tx, pending },
        JobReceiver { rx, closed: false },
    )
}
