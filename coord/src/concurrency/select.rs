//! Waiting on whichever of several streams is ready first.

use std::future::poll_fn;
use std::task::Poll;

use crate::concurrency::stream::StreamRx;

/// Waits until any stream in `streams` yields a value and returns it with its index.
///
/// Streams that are closed are skipped. Returns [`None`] when every stream is closed and
/// drained, or when `streams` is empty. When several streams are ready at once the lowest index
/// wins; callers that need fairness across repeated calls should use
/// [`crate::concurrency::fan_in::MergeStream`] instead.
pub async fn first_ready<T>(streams: &mut [StreamRx<T>]) -> Option<(usize, T)> {
    poll_fn(|cx| {
        let mut open = 0;
        for (index, stream) in streams.iter_mut().enumerate() {
            match stream.poll_recv(cx) {
                Poll::Ready(Some(value)) => return Poll::Ready(Some((index, value))),
                Poll::Ready(None) => {}
                Poll::Pending => open += 1,
            }
        }

        if open == 0 {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    })
    .await
}
