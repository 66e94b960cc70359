//! Fan-in: merging many producer streams into one.
//!
//! [`MergeStream`] is the merge loop itself, expressed as a [`Stream`] adapter over an explicit
//! live set of inputs. Each poll visits the live inputs round-robin, starting after the one that
//! produced last; an input that reports its end is removed from the live set on the spot and is
//! never polled again. The merged stream ends when the live set is empty.
//!
//! [`FanIn`] runs a [`MergeStream`] in a spawned task that forwards into a fresh output stream,
//! so consumers receive a plain [`StreamRx`] whose close means "every producer is done".

use core::pin::Pin;
use core::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::concurrency::cancel::CancelRx;
use crate::concurrency::future::optional_future;
use crate::concurrency::stream::{StreamRx, create_stream};
use crate::config::FanInConfig;
use crate::error::CoordResult;

/// Stream adapter yielding values from every input until all of them end.
///
/// Values of a single input keep their relative order. Nothing is guaranteed about the order
/// between values of different inputs.
#[must_use = "streams do nothing unless polled"]
#[derive(Debug)]
pub struct MergeStream<S> {
    /// Inputs that have not ended yet, tagged with their position in the original input list.
    live: Vec<(usize, S)>,
    /// Position in `live` where the next poll starts.
    cursor: usize,
}

impl<S> MergeStream<S>
where
    S: Stream + Unpin,
{
    /// Creates a merge over `inputs`.
    pub fn new<I>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
    {
        Self {
            live: inputs.into_iter().enumerate().collect(),
            cursor: 0,
        }
    }

    /// Returns the number of inputs that have not ended.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Returns whether every input has ended.
    pub fn is_terminated(&self) -> bool {
        self.live.is_empty()
    }

    /// Consumes the merge and returns the inputs that have not ended yet.
    pub fn into_live_inputs(self) -> Vec<S> {
        self.live.into_iter().map(|(_, input)| input).collect()
    }

    /// Polls for the next value together with the position of the input that produced it.
    pub fn poll_next_indexed(&mut self, cx: &mut Context<'_>) -> Poll<Option<(usize, S::Item)>> {
        let mut position = self.cursor;
        let mut pending = 0;

        while pending < self.live.len() {
            if position >= self.live.len() {
                position = 0;
            }

            let (source, input) = &mut self.live[position];
            match Pin::new(input).poll_next(cx) {
                Poll::Ready(Some(value)) => {
                    let source = *source;
                    self.cursor = position + 1;

                    return Poll::Ready(Some((source, value)));
                }
                Poll::Ready(None) => {
                    let (source, _) = self.live.remove(position);
                    debug!(
                        source,
                        remaining = self.live.len(),
                        "merge input ended, removed from live set"
                    );
                }
                Poll::Pending => {
                    position += 1;
                    pending += 1;
                }
            }
        }

        self.cursor = position;

        if self.live.is_empty() {
            Poll::Ready(None)
        } else {
            Poll::Pending
        }
    }
}

impl<S> Stream for MergeStream<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .poll_next_indexed(cx)
            .map(|next| next.map(|(_, value)| value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.live.is_empty() {
            (0, Some(0))
        } else {
            (0, None)
        }
    }
}

/// Summary returned by the forwarding task of a [`FanIn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanInSummary {
    /// Number of inputs the merge started with.
    pub inputs: usize,
    /// Number of values delivered to the output.
    pub forwarded: u64,
    /// Whether forwarding stopped because of the cancellation signal.
    pub cancelled: bool,
}

/// Builder for a merge of several streams into a single output stream.
#[derive(Debug)]
pub struct FanIn<T> {
    inputs: Vec<StreamRx<T>>,
    output_capacity: usize,
    cancel: Option<CancelRx>,
}

impl<T> FanIn<T>
where
    T: Send + 'static,
{
    /// Creates a fan-in over `inputs`.
    pub fn new<I>(inputs: I) -> Self
    where
        I: IntoIterator<Item = StreamRx<T>>,
    {
        Self {
            inputs: inputs.into_iter().collect(),
            output_capacity: FanInConfig::DEFAULT_OUTPUT_CAPACITY,
            cancel: None,
        }
    }

    /// Creates a fan-in over `inputs` using the output capacity of a validated configuration.
    pub fn from_config<I>(inputs: I, config: &FanInConfig) -> CoordResult<Self>
    where
        I: IntoIterator<Item = StreamRx<T>>,
    {
        config.validate()?;

        Ok(Self::new(inputs).with_output_capacity(config.output_capacity))
    }

    /// Sets how many merged values may wait for the consumer before forwarding blocks.
    pub fn with_output_capacity(mut self, output_capacity: usize) -> Self {
        self.output_capacity = output_capacity;
        self
    }

    /// Stops forwarding as soon as `cancel` is set.
    ///
    /// Inputs still open at that point are drained in the background, so producers blocked on
    /// them complete.
    pub fn with_cancellation(mut self, cancel: CancelRx) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Spawns the forwarding task and returns the merged output with the task handle.
    ///
    /// The output closes once, after every input ended and its values were forwarded, after
    /// cancellation, or when the consumer drops the output.
    pub fn spawn(self) -> (StreamRx<T>, JoinHandle<FanInSummary>) {
        let (tx, rx) = create_stream(self.output_capacity);
        let inputs = self.inputs.len();
        let cancel = self.cancel;
        let mut merged = MergeStream::new(self.inputs);

        let handle = tokio::spawn(async move {
            let mut summary = FanInSummary {
                inputs,
                forwarded: 0,
                cancelled: false,
            };

            loop {
                let next = tokio::select! {
                    biased;

                    _ = optional_future(cancel.as_ref().map(CancelRx::cancelled)) => {
                        summary.cancelled = true;
                        break;
                    }
                    next = merged.next() => next,
                };

                let Some(value) = next else {
                    break;
                };

                let sent = tokio::select! {
                    biased;

                    _ = optional_future(cancel.as_ref().map(CancelRx::cancelled)) => {
                        summary.cancelled = true;
                        break;
                    }
                    sent = tx.send(value) => sent,
                };

                if sent.is_err() {
                    debug!("fan-in output dropped by consumer, stopping");
                    break;
                }

                summary.forwarded += 1;
            }

            if summary.cancelled {
                let abandoned = merged.into_live_inputs();
                debug!(
                    abandoned = abandoned.len(),
                    forwarded = summary.forwarded,
                    "fan-in cancelled, draining open inputs"
                );
                for input in abandoned {
                    input.drain_in_background();
                }
            }

            debug!(
                inputs = summary.inputs,
                forwarded = summary.forwarded,
                "fan-in output closed"
            );

            summary
        });

        (rx, handle)
    }
}

/// Merges `inputs` into a single stream with the default output capacity.
pub fn fan_in<T, I>(inputs: I) -> StreamRx<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = StreamRx<T>>,
{
    FanIn::new(inputs).spawn().0
}
