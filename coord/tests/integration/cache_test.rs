use std::time::Duration;

use coord::concurrency::map::GuardedMap;
use coord::concurrency::stream::create_stream;
use coord::concurrency::tracker::CompletionTracker;
use coord_telemetry::tracing::init_test_tracing;
use rand::Rng;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cache_writers_and_readers_agree_once_tracker_closes_results() {
    init_test_tracing();

    let cache = GuardedMap::<u32, String>::new();
    let tracker = CompletionTracker::new();
    let (results_tx, results_rx) = create_stream(1);

    for task in 0..10u32 {
        let guard = tracker.track();
        let cache = cache.clone();
        let results_tx = results_tx.clone();
        let delay = Duration::from_millis(rand::thread_rng().gen_range(0..5));

        tokio::spawn(async move {
            cache.set(task, format!("value-{task}"));
            tokio::time::sleep(delay).await;

            let read = cache.get(&task);
            results_tx.send((task, read)).await.unwrap();
            drop(guard);
        });
    }
    tracker.close_when_done(results_tx);

    let mut results = results_rx.collect_all().await;
    results.sort_unstable();

    assert_eq!(results.len(), 10);
    for (task, read) in results {
        assert_eq!(read, Some(format!("value-{task}")));
    }
    assert_eq!(cache.len(), 10);
    assert_eq!(tracker.completions(), 1);
}
