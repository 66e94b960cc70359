//! Outstanding-work counter used to close shared streams at the right moment.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::bail;
use crate::concurrency::stream::StreamTx;
use crate::error::{CoordResult, ErrorKind};

#[derive(Debug, Default, Clone, Copy)]
struct TrackerState {
    outstanding: usize,
    /// Number of transitions from non-zero to zero.
    completions: u64,
}

/// Counts outstanding units of work and wakes waiters when none remain.
///
/// Call [`CompletionTracker::add`] before launching tasks and [`CompletionTracker::done`] once
/// per unit when it finishes, or use [`CompletionTracker::track`] to get a guard that does the
/// latter on drop. A `done` without a matching `add` fails with
/// [`ErrorKind::CompletionUnderflow`] and leaves the count untouched.
///
/// Cloning returns another handle to the same counter.
#[derive(Debug, Clone)]
pub struct CompletionTracker {
    state: Arc<watch::Sender<TrackerState>>,
}

impl CompletionTracker {
    /// Creates a tracker with nothing outstanding.
    pub fn new() -> Self {
        let (state, _) = watch::channel(TrackerState::default());
        Self {
            state: Arc::new(state),
        }
    }

    /// Registers `n` new units of outstanding work.
    pub fn add(&self, n: usize) {
        if n == 0 {
            return;
        }

        self.state.send_modify(|state| state.outstanding += n);
    }

    /// Marks one unit of work as finished.
    pub fn done(&self) -> CoordResult<()> {
        let mut underflow = false;
        let mut drained = false;

        self.state.send_if_modified(|state| {
            if state.outstanding == 0 {
                underflow = true;
                return false;
            }

            state.outstanding -= 1;
            if state.outstanding == 0 {
                state.completions += 1;
                drained = true;
            }

            true
        });

        if underflow {
            bail!(
                ErrorKind::CompletionUnderflow,
                "Completion tracker marked done more times than work was added"
            );
        }

        if drained {
            debug!("all tracked work completed");
        }

        Ok(())
    }

    /// Registers one unit of work and returns a guard that marks it done when dropped.
    ///
    /// The guard completes the unit on every exit path of its owner, including panics.
    pub fn track(&self) -> TaskGuard {
        self.add(1);
        TaskGuard {
            tracker: self.clone(),
        }
    }

    /// Waits until no work is outstanding.
    ///
    /// Returns immediately when the count is already zero.
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting.
        let _ = rx.wait_for(|state| state.outstanding == 0).await;
    }

    /// Returns the number of outstanding units.
    pub fn outstanding(&self) -> usize {
        self.state.borrow().outstanding
    }

    /// Returns how many times the count dropped back to zero.
    pub fn completions(&self) -> u64 {
        self.state.borrow().completions
    }

    /// Spawns a task that drops `tx` once no work is outstanding.
    ///
    /// When `tx` is the last sender of its stream, the stream closes exactly when the last
    /// producer finishes, so a consumer reading to the end sees every value and then stops.
    pub fn close_when_done<T>(&self, tx: StreamTx<T>) -> JoinHandle<()>
    where
        T: Send + 'static,
    {
        let tracker = self.clone();
        tokio::spawn(async move {
            tracker.wait().await;
            drop(tx);
        })
    }
}

impl Default for CompletionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one unit of work registered with [`CompletionTracker::track`].
#[must_use = "the unit is marked done as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TaskGuard {
    tracker: CompletionTracker,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if let Err(err) = self.tracker.done() {
            warn!(error = %err, "task guard dropped on an already drained tracker");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::concurrency::stream::create_stream;

    #[tokio::test]
    async fn wait_returns_immediately_when_nothing_is_outstanding() {
        let tracker = CompletionTracker::new();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn five_done_calls_release_waiter_and_sixth_fails() {
        let tracker = CompletionTracker::new();
        tracker.add(5);

        let waiter = {
            let tracker = tracker.clone();
            tokio::spawn(async move { tracker.wait().await })
        };

        for _ in 0..4 {
            tracker.done().unwrap();
        }
        assert_eq!(tracker.outstanding(), 1);
        assert!(!waiter.is_finished());

        tracker.done().unwrap();
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracker.completions(), 1);

        let err = tracker.done().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompletionUnderflow);
        assert!(err.kind().is_contract_violation());
        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(tracker.completions(), 1);
    }

    #[tokio::test]
    async fn guard_completes_unit_even_when_task_panics() {
        let tracker = CompletionTracker::new();

        let guard = tracker.track();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            panic!("task failed");
        });
        assert!(handle.await.unwrap_err().is_panic());

        assert_eq!(tracker.outstanding(), 0);
        assert_eq!(tracker.completions(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn close_when_done_closes_stream_after_last_producer() {
        let tracker = CompletionTracker::new();
        let (tx, rx) = create_stream(1);

        for producer in 0..10 {
            let guard = tracker.track();
            let tx = tx.clone();
            tokio::spawn(async move {
                tx.send(producer).await.unwrap();
                drop(guard);
            });
        }
        tracker.close_when_done(tx);

        let mut values = rx.collect_all().await;
        values.sort_unstable();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }
}
