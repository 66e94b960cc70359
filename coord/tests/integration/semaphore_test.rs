use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use coord::concurrency::semaphore::Semaphore;
use coord::concurrency::tracker::CompletionTracker;
use coord::config::SemaphoreConfig;
use coord::error::ErrorKind;
use coord_telemetry::tracing::init_test_tracing;
use rand::Rng;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn holders_never_exceed_permits_with_random_hold_times() {
    init_test_tracing();

    for permits in [1, 2, 5] {
        let semaphore = Semaphore::new(permits);
        let tracker = CompletionTracker::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let guard = tracker.track();
            let semaphore = semaphore.clone();
            let inside = inside.clone();
            let peak = peak.clone();
            let hold = Duration::from_micros(rand::thread_rng().gen_range(0..500));

            tokio::spawn(async move {
                let _guard = guard;
                let _permit = semaphore.acquire().await.unwrap();

                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(hold).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            });
        }

        tracker.wait().await;

        assert!(peak.load(Ordering::SeqCst) <= permits);
        assert_eq!(semaphore.available_permits(), permits);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_permit_semaphore_serializes_a_shared_counter() {
    init_test_tracing();

    let semaphore = Semaphore::from_config(&SemaphoreConfig {
        permits: 1,
        acquire_timeout_ms: None,
    })
    .unwrap();
    // Separate load and store: overlapping holders would lose increments.
    let counter = Arc::new(AtomicUsize::new(0));
    let tracker = CompletionTracker::new();

    for _ in 0..20 {
        let guard = tracker.track();
        let semaphore = semaphore.clone();
        let counter = counter.clone();

        tokio::spawn(async move {
            let _guard = guard;
            for _ in 0..50 {
                let _permit = semaphore.acquire().await.unwrap();
                let value = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(value + 1, Ordering::SeqCst);
            }
        });
    }

    tracker.wait().await;
    assert_eq!(counter.load(Ordering::SeqCst), 1000);
}

#[tokio::test]
async fn over_release_never_inflates_capacity() {
    init_test_tracing();

    let semaphore = Semaphore::new(2);
    for _ in 0..3 {
        let err = semaphore.release().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SemaphoreOverRelease);
    }

    let _first = semaphore.acquire().await.unwrap();
    let _second = semaphore.acquire().await.unwrap();
    assert!(semaphore.try_acquire().unwrap().is_none());
}
