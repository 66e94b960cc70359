use std::time::Duration;

use coord::concurrency::cancel::create_cancel_channel;
use coord::concurrency::fan_in::fan_in;
use coord::concurrency::map::GuardedMap;
use coord::concurrency::stream::{StreamTx, create_stream};
use coord::config::WorkerPoolConfig;
use coord::error::{CoordResult, ErrorKind};
use coord::workers::base::{JobContext, WorkerId};
use coord::workers::pool::WorkerPool;
use coord_telemetry::tracing::init_test_tracing;
use rand::Rng;

#[derive(Debug)]
struct Request {
    id: u32,
    reply: StreamTx<(u32, WorkerId)>,
}

async fn answer(request: Request, context: JobContext) -> CoordResult<()> {
    let delay = Duration::from_micros(rand::thread_rng().gen_range(0..200));
    tokio::time::sleep(delay).await;

    // The requester may have stopped listening; that is not a job failure.
    let _ = request.reply.send((request.id, context.worker_id())).await;

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn load_balancer_answers_every_request_exactly_once() {
    init_test_tracing();

    let config = WorkerPoolConfig {
        worker_count: 4,
        queue_capacity: Some(8),
    };
    let pool = WorkerPool::start(&config, answer).unwrap();

    // Each requester has its own reply stream; replies are merged for checking.
    let mut replies = Vec::new();
    let mut requesters = Vec::new();
    for requester in 0..5u32 {
        let (reply_tx, reply_rx) = create_stream(4);
        replies.push(reply_rx);

        let sender = pool.sender();
        requesters.push(tokio::spawn(async move {
            for sequence in 0..40 {
                let request = Request {
                    id: requester * 1000 + sequence,
                    reply: reply_tx.clone(),
                };
                sender.submit(request).await.unwrap();
            }
        }));
    }
    let collected = tokio::spawn(fan_in(replies).collect_all());

    for requester in requesters {
        requester.await.unwrap();
    }
    let report = pool.stop().await.unwrap();
    assert_eq!(report.processed, 200);
    assert_eq!(report.succeeded(), 200);

    let answered = GuardedMap::<u32, WorkerId>::new();
    for (id, worker_id) in collected.await.unwrap() {
        assert!(worker_id.0 < config.worker_count);
        let previous = answered.update(id, |slot| slot.replace(worker_id));
        assert!(previous.is_none(), "request {id} answered twice");
    }
    assert_eq!(answered.len(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_pool_rejects_new_jobs_and_returns_them() {
    init_test_tracing();

    let (_never_cancelled, external) = create_cancel_channel();
    let pool = WorkerPool::start(&WorkerPoolConfig::with_workers(2), move |_job: u32, ctx: JobContext| {
        let external = external.clone();
        async move {
            tokio::select! {
                _ = ctx.cancel().cancelled() => {}
                _ = external.cancelled() => {}
            }
            Ok::<_, coord::error::CoordError>(())
        }
    })
    .unwrap();

    let sender = pool.sender();
    for job in 0..4 {
        sender.submit(job).await.unwrap();
    }

    let report = pool.cancel().await.unwrap();
    assert_eq!(report.processed + report.discarded, 4);
    assert!(report.processed <= 2);

    let rejected = sender.submit(99).await.unwrap_err();
    assert_eq!(rejected.into_job(), 99);

    let err: coord::error::CoordError = sender.submit(100).await.unwrap_err().into();
    assert_eq!(err.kind(), ErrorKind::QueueClosed);
}
