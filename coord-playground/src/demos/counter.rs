use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use coord::concurrency::map::GuardedMap;
use coord::concurrency::semaphore::Semaphore;
use coord::concurrency::tracker::CompletionTracker;
use coord::error::CoordResult;
use coord_config::shared::SemaphoreConfig;
use tracing::info;

const COUNTER_KEY: &str = "counter";

/// Increments a counter with a separate read and write, serialized by a single-permit semaphore,
/// then runs the same tasks under the configured permit count and reports the peak concurrency.
pub async fn run(config: &SemaphoreConfig, tasks: u32, increments: u32) -> anyhow::Result<()> {
    let lock = Semaphore::new(1);
    let counter = GuardedMap::<&'static str, u64>::new();
    let tracker = CompletionTracker::new();
    let mut handles = Vec::with_capacity(tasks as usize);

    for _ in 0..tasks {
        let guard = tracker.track();
        let lock = lock.clone();
        let counter = counter.clone();

        handles.push(tokio::spawn(async move {
            let _guard = guard;
            for _ in 0..increments {
                let _permit = lock.acquire().await?;
                let current = counter.get(&COUNTER_KEY).unwrap_or(0);
                tokio::task::yield_now().await;
                counter.set(COUNTER_KEY, current + 1);
            }

            CoordResult::Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }
    tracker.wait().await;

    info!(
        counter = counter.get(&COUNTER_KEY).unwrap_or(0),
        expected = u64::from(tasks) * u64::from(increments),
        "counter scenario finished"
    );

    let peak = limited_section(config, tasks).await?;
    info!(permits = config.permits, peak, "bounded section scenario finished");

    Ok(())
}

async fn limited_section(config: &SemaphoreConfig, tasks: u32) -> anyhow::Result<usize> {
    let semaphore = Semaphore::from_config(config)?;
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let acquire_timeout = config.acquire_timeout();
    let mut handles = Vec::with_capacity(tasks as usize);

    for task in 0..tasks {
        let semaphore = semaphore.clone();
        let inside = inside.clone();
        let peak = peak.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match acquire_timeout {
                Some(timeout) => semaphore.acquire_timeout(timeout).await?,
                None => semaphore.acquire().await?,
            };

            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            info!(task, inside = now, "entered bounded section");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            inside.fetch_sub(1, Ordering::SeqCst);

            CoordResult::Ok(())
        }));
    }

    for handle in handles {
        handle.await??;
    }

    Ok(peak.load(Ordering::SeqCst))
}
