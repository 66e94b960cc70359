use std::time::Duration;

use coord::concurrency::fan_in::FanIn;
use coord::concurrency::stream::{StreamRx, create_stream};
use coord_config::shared::FanInConfig;
use rand::Rng;
use tracing::{info, warn};

fn spawn_producer(name: &'static str, count: u32) -> StreamRx<String> {
    let (tx, rx) = create_stream(1);

    tokio::spawn(async move {
        for sequence in 0..count {
            let delay = Duration::from_millis(rand::thread_rng().gen_range(0..50));
            tokio::time::sleep(delay).await;

            if tx.send(format!("{name} {sequence}")).await.is_err() {
                warn!(name, "merged stream closed, producer stopping");
                return;
            }
        }
    });

    rx
}

/// Merges a producer of five values with a producer of six and prints the merged stream.
pub async fn run(config: &FanInConfig) -> anyhow::Result<()> {
    let (mut merged, handle) =
        FanIn::from_config([spawn_producer("first", 5), spawn_producer("second", 6)], config)?
            .spawn();

    while let Some(value) = merged.recv().await {
        info!(%value, "merged value received");
    }

    let summary = handle.await?;
    info!(
        inputs = summary.inputs,
        forwarded = summary.forwarded,
        "fan-in scenario finished"
    );

    Ok(())
}
