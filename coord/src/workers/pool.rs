use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::concurrency::cancel::{CancelRx, CancelTx, create_cancel_channel};
use crate::concurrency::tracker::CompletionTracker;
use crate::config::WorkerPoolConfig;
use crate::error::CoordResult;
#[cfg(feature = "failpoints")]
use crate::failpoints::{WORKER_POOL__BEFORE_JOB, coord_fail_point};
use crate::workers::base::{JobContext, JobHandler, WorkerId};
use crate::workers::queue::{JobReceiver, JobSender, QueuedJob, SubmitError, job_queue};

#[derive(Debug, Default)]
struct PoolCounters {
    processed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
}

/// Job counts of a worker pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Jobs handed to the handler, whatever their outcome.
    pub processed: u64,
    /// Jobs whose handler returned an error.
    pub failed: u64,
    /// Jobs whose handler panicked.
    pub panicked: u64,
    /// Queued jobs dropped without being processed, because the pool was cancelled or its
    /// workers exited early.
    pub discarded: u64,
}

impl PoolReport {
    /// Jobs that completed successfully.
    pub fn succeeded(&self) -> u64 {
        self.processed
            .saturating_sub(self.failed)
            .saturating_sub(self.panicked)
    }
}

/// Read-only view of a pool's job counts that outlives the pool.
///
/// Useful when [`WorkerPool::stop`] fails: the error carries the worker failures while the
/// counts stay readable here.
#[derive(Debug, Clone)]
pub struct PoolStats {
    counters: Arc<PoolCounters>,
}

impl PoolStats {
    /// Returns the job counts so far.
    pub fn report(&self) -> PoolReport {
        self.stats().report()
    }

    /// Returns a handle to the job counts that stays valid after the pool is shut down.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            counters: self.counters.clone(),
        }
    }
}

/// Fixed-size pool of workers consuming a shared job queue.
///
/// Each submitted job is processed exactly once, by exactly one worker. A job that fails or
/// panics is counted and logged; the worker that ran it stays alive and takes the next job.
///
/// The pool is shut down in one of two ways:
///
/// - [`WorkerPool::stop`] rejects new submissions, lets the workers process every job already
///   queued, then waits for them to exit.
/// - [`WorkerPool::cancel`] rejects new submissions and signals cancellation. Workers finish the
///   job in hand (handlers can observe [`JobContext::cancel`] to return early) and exit; jobs
///   still queued are discarded and counted.
///
/// Dropping the pool without calling either aborts the workers.
pub struct WorkerPool<J> {
    sender: JobSender<J>,
    queue: Arc<Mutex<JobReceiver<J>>>,
    workers: JoinSet<(WorkerId, CoordResult<()>)>,
    closing: CancelTx,
    cancel: CancelTx,
    pending: CompletionTracker,
    counters: Arc<PoolCounters>,
    worker_count: usize,
}

impl<J> WorkerPool<J>
where
    J: Send + 'static,
{
    /// Starts `config.worker_count` workers running `handler`.
    ///
    /// Fails with [`crate::error::ErrorKind::InvalidConfiguration`] when the configuration has
    /// no workers or a zero queue capacity. Must be called within a tokio runtime.
    pub fn start<H>(config: &WorkerPoolConfig, handler: H) -> CoordResult<Self>
    where
        H: JobHandler<J>,
    {
        config.validate()?;

        let pending = CompletionTracker::new();
        let (sender, receiver) = job_queue(config.queue_capacity, pending.clone());
        let queue = Arc::new(Mutex::new(receiver));
        let (closing, closing_rx) = create_cancel_channel();
        let (cancel, cancel_rx) = create_cancel_channel();
        let handler = Arc::new(handler);
        let counters = Arc::new(PoolCounters::default());

        let mut workers = JoinSet::new();
        for index in 0..config.worker_count {
            let worker = PoolWorker {
                id: WorkerId(index),
                queue: queue.clone(),
                handler: handler.clone(),
                closing: closing_rx.clone(),
                cancel: cancel_rx.clone(),
                counters: counters.clone(),
            };

            workers.spawn(async move {
                let id = worker.id;
                (id, worker.run().await)
            });
        }

        info!(
            worker_count = config.worker_count,
            queue_capacity = ?config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            sender,
            queue,
            workers,
            closing,
            cancel,
            pending,
            counters,
            worker_count: config.worker_count,
        })
    }

    /// Returns a submitter that can be moved to producer tasks.
    pub fn sender(&self) -> JobSender<J> {
        self.sender.clone()
    }

    /// Queues `job`, waiting for room when the queue is full.
    pub async fn submit(&self, job: J) -> Result<(), SubmitError<J>> {
        self.sender.submit(job).await
    }

    /// Queues `job` only if there is room right now.
    pub fn try_submit(&self, job: J) -> Result<(), SubmitError<J>> {
        self.sender.try_submit(job)
    }

    /// Waits until every job submitted so far has been processed or discarded.
    ///
    /// The pool keeps running; new submissions made while waiting extend the wait.
    pub async fn wait_idle(&self) {
        self.pending.wait().await;
    }

    /// Returns the number of submitted jobs not yet processed or discarded.
    pub fn pending_jobs(&self) -> usize {
        self.pending.outstanding()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Returns the job counts so far.
    pub fn report(&self) -> PoolReport {
        PoolReport {
            processed: self.counters.processed.load(Ordering::Acquire),
            failed: self.counters.failed.load(Ordering::Acquire),
            panicked: self.counters.panicked.load(Ordering::Acquire),
            discarded: self.counters.discarded.load(Ordering::Acquire),
        }
    }

    /// Stops accepting jobs, processes every queued job, and waits for all workers to exit.
    ///
    /// Worker failures, as opposed to job failures, are returned as errors, aggregated when more
    /// than one worker failed.
    pub async fn stop(mut self) -> CoordResult<PoolReport> {
        info!(pending = self.pending.outstanding(), "stopping worker pool");
        self.closing.cancel();

        self.shutdown().await
    }

    /// Stops accepting jobs, signals cancellation, and discards every job still queued.
    ///
    /// Waits for jobs already in progress to return.
    pub async fn cancel(mut self) -> CoordResult<PoolReport> {
        info!(pending = self.pending.outstanding(), "cancelling worker pool");
        self.closing.cancel();
        self.cancel.cancel();

        self.shutdown().await
    }

    async fn shutdown(&mut self) -> CoordResult<PoolReport> {
        let result = self.wait_workers().await;

        // Workers that exited early may have left jobs behind.
        let discarded = self.discard_queued().await;
        if discarded > 0 {
            warn!(discarded, "discarded queued jobs");
        }

        let report = self.report();
        info!(
            processed = report.processed,
            failed = report.failed,
            panicked = report.panicked,
            discarded = report.discarded,
            "worker pool stopped"
        );

        result.map(|()| report)
    }

    async fn wait_workers(&mut self) -> CoordResult<()> {
        let mut errors = Vec::new();

        while let Some(result) = self.workers.join_next().await {
            match result {
                Ok((worker_id, Ok(()))) => {
                    debug!(%worker_id, "worker exited");
                }
                Ok((worker_id, Err(err))) => {
                    error!(%worker_id, error = %err, "worker exited with error");
                    errors.push(err);
                }
                Err(join_err) => {
                    error!(error = %join_err, "worker task failed");
                    errors.push(join_err.into());
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into())
        }
    }

    async fn discard_queued(&self) -> u64 {
        let mut queue = self.queue.lock().await;
        queue.close();

        let mut discarded = 0;
        while queue.try_recv().is_some() {
            discarded += 1;
        }

        self.counters
            .discarded
            .fetch_add(discarded, Ordering::AcqRel);

        discarded
    }
}

impl<J> fmt::Debug for WorkerPool<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("pending", &self.pending.outstanding())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

struct PoolWorker<J, H> {
    id: WorkerId,
    queue: Arc<Mutex<JobReceiver<J>>>,
    handler: Arc<H>,
    closing: CancelRx,
    cancel: CancelRx,
    counters: Arc<PoolCounters>,
}

impl<J, H> PoolWorker<J, H>
where
    J: Send + 'static,
    H: JobHandler<J>,
{
    async fn run(self) -> CoordResult<()> {
        debug!(worker_id = %self.id, "worker started");

        loop {
            // Checked before dequeuing so that a failing worker leaves its next job queued.
            #[cfg(feature = "failpoints")]
            coord_fail_point(WORKER_POOL__BEFORE_JOB)?;

            let Some(queued) = self.next_job().await else {
                break;
            };

            let (job, pending) = queued.into_parts();
            self.execute(job).await;
            drop(pending);
        }

        debug!(worker_id = %self.id, "worker finished, no more jobs");

        Ok(())
    }

    /// Takes the next job, or returns [`None`] once the pool is cancelled or the queue is closed
    /// and drained.
    async fn next_job(&self) -> Option<QueuedJob<J>> {
        loop {
            let mut queue = self.queue.lock().await;

            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => return None,
                _ = self.closing.cancelled(), if !queue.is_closed() => {
                    queue.close();
                    debug!(worker_id = %self.id, "job queue closed, draining remaining jobs");
                }
                queued = queue.recv() => return queued,
            }
        }
    }

    async fn execute(&self, job: J) {
        let context = JobContext::new(self.id, self.cancel.clone());
        // The handler call itself is inside the guarded future, so a handler that panics before
        // returning its future is caught too.
        let outcome = AssertUnwindSafe(async { self.handler.handle(job, context).await })
            .catch_unwind()
            .await;

        self.counters.processed.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                self.counters.failed.fetch_add(1, Ordering::AcqRel);
                warn!(worker_id = %self.id, error = %err, "job failed");
            }
            Err(payload) => {
                self.counters.panicked.fetch_add(1, Ordering::AcqRel);
                error!(
                    worker_id = %self.id,
                    panic = panic_message(payload.as_ref()),
                    "job panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
