use std::time::Duration;

use coord::concurrency::cancel::{
    CancelResult, create_cancel_channel, recv_or_cancel, run_until_cancelled,
};
use coord::concurrency::stream::create_stream;
use coord::concurrency::tracker::CompletionTracker;
use coord_telemetry::tracing::init_test_tracing;

#[tokio::test(start_paused = true)]
async fn broadcast_cancel_stops_every_worker_and_abandoned_inputs_are_drained() {
    init_test_tracing();

    let (cancel_tx, cancel_rx) = create_cancel_channel();
    let tracker = CompletionTracker::new();
    let mut drains = Vec::new();
    let mut producers = Vec::new();
    let mut workers = Vec::new();

    for worker in 0..3u32 {
        let (work_tx, mut work_rx) = create_stream(1);
        producers.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            for value in 0..3 {
                if work_tx.send(worker * 10 + value).await.is_err() {
                    return false;
                }
            }
            true
        }));

        let guard = tracker.track();
        let cancel_rx = cancel_rx.clone();
        workers.push(tokio::spawn(async move {
            let _guard = guard;
            let outcome = recv_or_cancel(&mut work_rx, &cancel_rx).await;
            (outcome, work_rx)
        }));
    }

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(cancel_tx.cancel());
    tracker.wait().await;

    for worker in workers {
        let (outcome, abandoned) = worker.await.unwrap();
        assert!(outcome.is_cancelled());
        drains.push(abandoned.drain_in_background());
    }

    // Every slow producer still delivers all of its values, more than the stream buffers.
    for producer in producers {
        assert!(producer.await.unwrap());
    }
    for drain in drains {
        assert_eq!(drain.await.unwrap(), 3);
    }
}

#[tokio::test(start_paused = true)]
async fn late_observer_returns_immediately_and_repeated_cancel_is_harmless() {
    init_test_tracing();

    let (cancel_tx, cancel_rx) = create_cancel_channel();
    cancel_tx.cancel();
    cancel_tx.cancel();

    let late = cancel_tx.subscribe();
    let result = run_until_cancelled(tokio::time::sleep(Duration::from_secs(60)), &late).await;
    assert_eq!(result, CancelResult::Cancelled(()));
    assert!(cancel_rx.is_cancelled());
}
