use std::time::Duration;

use coord::concurrency::fan_in::{FanIn, MergeStream};
use coord::concurrency::select::first_ready;
use coord::concurrency::stream::{StreamRx, create_stream};
use coord::config::FanInConfig;
use coord_telemetry::tracing::init_test_tracing;
use futures::StreamExt;
use rand::Rng;

fn producer(name: &'static str, count: u32) -> StreamRx<(&'static str, u32)> {
    let (tx, rx) = create_stream(1);
    tokio::spawn(async move {
        for sequence in 0..count {
            let delay = Duration::from_millis(rand::thread_rng().gen_range(0..3));
            tokio::time::sleep(delay).await;
            tx.send((name, sequence)).await.unwrap();
        }
    });

    rx
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merged_output_holds_every_value_once_in_per_producer_order() {
    init_test_tracing();

    let config = FanInConfig::default();
    let inputs = vec![producer("first", 5), producer("second", 6)];
    let (output, handle) = FanIn::from_config(inputs, &config).unwrap().spawn();

    let values = output.collect_all().await;
    assert_eq!(values.len(), 11);

    for (name, count) in [("first", 5), ("second", 6)] {
        let sequences: Vec<u32> = values
            .iter()
            .filter(|(source, _)| *source == name)
            .map(|(_, sequence)| *sequence)
            .collect();
        assert_eq!(sequences, (0..count).collect::<Vec<_>>());
    }

    let summary = handle.await.unwrap();
    assert_eq!(summary.inputs, 2);
    assert_eq!(summary.forwarded, 11);
    assert!(!summary.cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merge_stream_tags_values_with_their_source() {
    init_test_tracing();

    let mut merged = MergeStream::new(vec![producer("a", 3), producer("b", 4), producer("c", 0)]);
    let mut seen = Vec::new();

    while let Some((source, (name, _))) =
        futures::future::poll_fn(|cx| merged.poll_next_indexed(cx)).await
    {
        let expected = ["a", "b", "c"][source];
        assert_eq!(name, expected);
        seen.push(name);
    }

    assert_eq!(seen.len(), 7);
    assert!(merged.is_terminated());
    assert_eq!(merged.next().await, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn first_ready_waits_on_two_streams() {
    init_test_tracing();

    let (fast_tx, fast_rx) = create_stream(1);
    let (slow_tx, slow_rx) = create_stream(1);
    let mut streams = [slow_rx, fast_rx];

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        fast_tx.send("fast").await.unwrap();
    });
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        let _ = slow_tx.send("slow").await;
    });

    let first = tokio::time::timeout(Duration::from_secs(2), first_ready(&mut streams))
        .await
        .unwrap();
    assert_eq!(first, Some((1, "fast")));
}
