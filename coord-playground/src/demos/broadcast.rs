use std::time::Duration;

use coord::concurrency::cancel::{CancelResult, create_cancel_channel, recv_or_cancel};
use coord::concurrency::stream::create_stream;
use coord::concurrency::tracker::CompletionTracker;
use tracing::info;

/// Starts `workers` workers, each waiting for the result of slow work, and cancels them all at
/// once before the work completes.
///
/// Every abandoned result stream is drained so the slow producers still finish.
pub async fn run(workers: u32) -> anyhow::Result<()> {
    let (cancel_tx, cancel_rx) = create_cancel_channel();
    let tracker = CompletionTracker::new();
    let mut handles = Vec::with_capacity(workers as usize);

    for worker in 0..workers {
        let (work_tx, mut work_rx) = create_stream(1);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            // A closed stream means the result is no longer wanted.
            let _ = work_tx.send(format!("work of worker {worker} completed")).await;
        });

        let guard = tracker.track();
        let cancel_rx = cancel_rx.clone();
        handles.push(tokio::spawn(async move {
            let _guard = guard;
            match recv_or_cancel(&mut work_rx, &cancel_rx).await {
                CancelResult::Ok(result) => info!(worker, ?result, "worker received result"),
                CancelResult::Cancelled(()) => info!(worker, "worker cancelled"),
            }

            work_rx
        }));
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel_tx.cancel();
    tracker.wait().await;

    let mut drains = Vec::with_capacity(handles.len());
    for handle in handles {
        drains.push(handle.await?.drain_in_background());
    }
    for drain in drains {
        let discarded = drain.await?;
        info!(discarded, "abandoned result stream drained");
    }

    info!("broadcast scenario finished");

    Ok(())
}
