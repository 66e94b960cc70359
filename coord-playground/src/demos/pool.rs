use std::time::Duration;

use coord::concurrency::map::GuardedMap;
use coord::error::CoordResult;
use coord::workers::base::{JobContext, WorkerId};
use coord::workers::pool::WorkerPool;
use coord_config::shared::WorkerPoolConfig;
use rand::Rng;
use tracing::info;

async fn process(job: u32, context: JobContext, load: GuardedMap<WorkerId, u32>) -> CoordResult<()> {
    let delay = Duration::from_millis(rand::thread_rng().gen_range(10..100));
    tokio::time::sleep(delay).await;

    load.update(context.worker_id(), |count| {
        *count.get_or_insert(0) += 1;
    });
    info!(job, worker_id = %context.worker_id(), "job processed");

    Ok(())
}

/// Balances `jobs` jobs with random durations across the configured workers and reports how many
/// each worker took.
pub async fn run(config: &WorkerPoolConfig, jobs: u32) -> anyhow::Result<()> {
    let load = GuardedMap::new();

    let pool = {
        let load = load.clone();
        WorkerPool::start(config, move |job: u32, context: JobContext| {
            process(job, context, load.clone())
        })?
    };

    for job in 0..jobs {
        pool.submit(job).await?;
    }

    let report = pool.stop().await?;

    let mut per_worker: Vec<_> = load.snapshot().into_iter().collect();
    per_worker.sort_unstable();
    for (worker_id, count) in per_worker {
        info!(%worker_id, jobs = count, "worker load");
    }

    info!(
        processed = report.processed,
        failed = report.failed,
        panicked = report.panicked,
        "pool scenario finished"
    );

    Ok(())
}
