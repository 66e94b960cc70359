//! One-shot broadcast cancellation.
//!
//! The signal is a watch channel over a `bool` that only ever moves from `false` to `true`.
//! Every receiver observes the transition, including receivers created or polled after it
//! happened, which is what separates it from a single-value notification that wakes at most one
//! waiter.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::concurrency::stream::StreamRx;

/// Result of an operation raced against a cancellation signal.
///
/// Cancellation is an expected outcome, so it travels next to the normal result rather than as
/// an error. The optional `I` payload carries whatever partial state the operation hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelResult<T, I = ()> {
    /// The operation completed before cancellation.
    Ok(T),
    /// Cancellation won the race.
    Cancelled(I),
}

impl<T, I> CancelResult<T, I> {
    /// Returns whether cancellation won.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CancelResult::Cancelled(_))
    }

    /// Returns the completed value, discarding a cancellation payload.
    pub fn ok(self) -> Option<T> {
        match self {
            CancelResult::Ok(value) => Some(value),
            CancelResult::Cancelled(_) => None,
        }
    }
}

/// Transmitter side of the cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelTx(Arc<watch::Sender<bool>>);

impl CancelTx {
    /// Sets the signal.
    ///
    /// Returns `true` for the call that performed the transition and `false` for every later
    /// call, which is a no-op.
    pub fn cancel(&self) -> bool {
        let transitioned = self.0.send_if_modified(|cancelled| {
            if *cancelled {
                return false;
            }

            *cancelled = true;
            true
        });

        if transitioned {
            debug!(observers = self.0.receiver_count(), "cancellation signaled");
        }

        transitioned
    }

    /// Returns whether the signal is set.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Creates a new observer of this signal.
    pub fn subscribe(&self) -> CancelRx {
        CancelRx(self.0.subscribe())
    }
}

/// Receiver side of the cancellation signal, handed to observers as a read-only capability.
#[derive(Debug, Clone)]
pub struct CancelRx(watch::Receiver<bool>);

impl CancelRx {
    /// Waits until the signal is set, returning immediately if it already is.
    ///
    /// Never resolves when every [`CancelTx`] is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Returns whether the signal is set.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Creates a new, unset cancellation signal.
pub fn create_cancel_channel() -> (CancelTx, CancelRx) {
    let (tx, rx) = watch::channel(false);
    (CancelTx(Arc::new(tx)), CancelRx(rx))
}

/// Drives `future` until it completes or `cancel` is set, whichever happens first.
///
/// When both are ready, cancellation wins. A cancelled future is dropped at its current
/// suspension point.
pub async fn run_until_cancelled<F>(future: F, cancel: &CancelRx) -> CancelResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => CancelResult::Cancelled(()),
        output = future => CancelResult::Ok(output),
    }
}

/// Waits for the next value of `stream` or for cancellation.
///
/// When cancellation wins the caller is expected to either keep draining the stream or hand it
/// to [`StreamRx::drain_in_background`], so that the producer feeding it is not left blocked.
pub async fn recv_or_cancel<T>(
    stream: &mut StreamRx<T>,
    cancel: &CancelRx,
) -> CancelResult<Option<T>> {
    run_until_cancelled(stream.recv(), cancel).await
}
