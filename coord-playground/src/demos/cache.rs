use std::time::Duration;

use coord::concurrency::map::GuardedMap;
use coord::concurrency::stream::create_stream;
use coord::concurrency::tracker::CompletionTracker;
use rand::Rng;
use tracing::{info, warn};

/// Every task stores a value under its own key, then reads it back after a random delay.
///
/// Results travel over one stream, closed by the tracker once the last task is done.
pub async fn run(tasks: u32) -> anyhow::Result<()> {
    let cache = GuardedMap::<u32, String>::with_capacity(tasks as usize);
    let tracker = CompletionTracker::new();
    let (results_tx, mut results_rx) = create_stream(tasks as usize);

    for task in 0..tasks {
        let guard = tracker.track();
        let cache = cache.clone();
        let results_tx = results_tx.clone();
        let delay = Duration::from_millis(rand::thread_rng().gen_range(0..100));

        tokio::spawn(async move {
            let _guard = guard;
            cache.set(task, format!("value computed by task {task}"));
            tokio::time::sleep(delay).await;

            if results_tx.send((task, cache.get(&task))).await.is_err() {
                warn!(task, "results stream closed before the task reported");
            }
        });
    }
    tracker.close_when_done(results_tx);

    while let Some((task, value)) = results_rx.recv().await {
        info!(task, ?value, "read back from cache");
    }

    info!(entries = cache.len(), "cache scenario finished");

    Ok(())
}
