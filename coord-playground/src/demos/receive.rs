use std::time::Duration;

use coord::concurrency::select::first_ready;
use coord::concurrency::stream::{TryRecv, create_stream};
use coord::concurrency::timeout::with_timeout;
use coord::error::ErrorKind;
use tracing::info;

/// Waits at most `timeout_ms` for a value that arrives after `delay_ms`, then bounds a plain
/// sleep of the same length with the same deadline.
pub async fn timeout(timeout_ms: u64, delay_ms: u64) -> anyhow::Result<()> {
    let deadline = Duration::from_millis(timeout_ms);
    let (tx, mut rx) = create_stream(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        let _ = tx.send("delayed value").await;
    });

    match rx.recv_timeout(deadline).await {
        Ok(Some(value)) => info!(value, "value received before the deadline"),
        Ok(None) => info!("stream closed before a value arrived"),
        Err(err) if err.kind() == ErrorKind::OperationTimedOut => {
            info!(timeout_ms, "no value before the deadline");
        }
        Err(err) => return Err(err.into()),
    }

    let work = tokio::time::sleep(Duration::from_millis(delay_ms));
    match with_timeout(deadline, work).await {
        Ok(()) => info!(delay_ms, "work finished before the deadline"),
        Err(err) if err.kind().is_retriable() => info!(%err, "work abandoned at the deadline"),
        Err(err) => return Err(err.into()),
    }

    Ok(())
}

/// Waits on two streams fed at different speeds and reports which one delivered first.
pub async fn select() -> anyhow::Result<()> {
    let (slow_tx, slow_rx) = create_stream(1);
    let (fast_tx, fast_rx) = create_stream(1);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = slow_tx.send("slow").await;
    });
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = fast_tx.send("fast").await;
    });

    let mut streams = [slow_rx, fast_rx];
    while let Some((index, value)) = first_ready(&mut streams).await {
        info!(index, value, "stream delivered");
    }

    info!("select scenario finished, both streams closed");

    Ok(())
}

/// Polls a stream without waiting until it is closed.
pub async fn non_blocking() -> anyhow::Result<()> {
    let (tx, mut rx) = create_stream(4);

    tokio::spawn(async move {
        for value in 0..3u32 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let _ = tx.send(value).await;
        }
    });

    let mut empty_polls = 0u32;
    loop {
        match rx.try_recv() {
            TryRecv::Value(value) => info!(value, "value ready"),
            TryRecv::Empty => {
                empty_polls += 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            TryRecv::Closed => break,
        }
    }

    info!(empty_polls, "non-blocking scenario finished");

    Ok(())
}
