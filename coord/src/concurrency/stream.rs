//! Closable value streams between tasks.
//!
//! A stream is a bounded tokio mpsc channel. The sending half ([`StreamTx`]) may be cloned
//! freely; the stream closes once every sender is dropped or the receiver calls
//! [`StreamRx::close`]. The receiving half ([`StreamRx`]) yields every value already produced
//! before reporting the close, and reports it exactly once per drain: after `None` is returned
//! no further values can arrive.

use core::pin::Pin;
use core::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::CoordResult;

/// Sending half of a stream.
pub type StreamTx<T> = mpsc::Sender<T>;

/// Outcome of a non-blocking receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TryRecv<T> {
    /// A value was ready.
    Value(T),
    /// The stream is open but nothing is buffered.
    Empty,
    /// The stream is closed and fully drained.
    Closed,
}

/// Receiving half of a stream.
#[derive(Debug)]
pub struct StreamRx<T> {
    inner: mpsc::Receiver<T>,
}

/// Creates a stream buffering up to `capacity` values before senders wait.
///
/// A capacity of zero is raised to one, the closest a tokio channel gets to a rendezvous.
pub fn create_stream<T>(capacity: usize) -> (StreamTx<T>, StreamRx<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, StreamRx { inner: rx })
}

impl<T> StreamRx<T> {
    /// Waits for the next value, returning [`None`] once the stream is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.recv().await
    }

    /// Takes the next value if one is buffered, without waiting.
    pub fn try_recv(&mut self) -> TryRecv<T> {
        match self.inner.try_recv() {
            Ok(value) => TryRecv::Value(value),
            Err(TryRecvError::Empty) => TryRecv::Empty,
            Err(TryRecvError::Disconnected) => TryRecv::Closed,
        }
    }

    /// Waits at most `duration` for the next value.
    ///
    /// Elapsing yields [`crate::error::ErrorKind::OperationTimedOut`]; the stream stays usable
    /// and no value is lost.
    pub async fn recv_timeout(&mut self, duration: Duration) -> CoordResult<Option<T>> {
        Ok(tokio::time::timeout(duration, self.inner.recv()).await?)
    }

    /// Polls for the next value, registering the waker when nothing is ready.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.inner.poll_recv(cx)
    }

    /// Closes the stream from the receiving side.
    ///
    /// Senders fail from now on, values already buffered can still be received.
    pub fn close(&mut self) {
        self.inner.close();
    }

    /// Collects every remaining value until the stream closes.
    pub async fn collect_all(mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.inner.recv().await {
            values.push(value);
        }

        values
    }
}

impl<T> StreamRx<T>
where
    T: Send + 'static,
{
    /// Abandons the stream while keeping its producers unblocked.
    ///
    /// A background task keeps receiving and discarding values until every sender is gone, so a
    /// producer waiting to deliver into this stream completes instead of waiting forever. The
    /// returned handle resolves to the number of discarded values.
    pub fn drain_in_background(mut self) -> JoinHandle<usize> {
        tokio::spawn(async move {
            let mut discarded = 0;
            while self.inner.recv().await.is_some() {
                discarded += 1;
            }

            debug!(discarded, "abandoned stream drained");

            discarded
        })
    }
}

impl<T> Stream for StreamRx<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_recv(cx)
    }
}
