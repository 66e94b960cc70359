use coord::config::WorkerPoolConfig;
use coord::error::{CoordResult, ErrorKind};
use coord::failpoints::WORKER_POOL__BEFORE_JOB;
use coord::workers::base::JobContext;
use coord::workers::pool::WorkerPool;
use coord_telemetry::tracing::init_test_tracing;
use fail::FailScenario;

async fn succeed(_job: u32, _context: JobContext) -> CoordResult<()> {
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn injected_worker_fault_is_reported_and_other_workers_keep_going() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(WORKER_POOL__BEFORE_JOB, "1*return(boom)->off").unwrap();

    let pool = WorkerPool::start(&WorkerPoolConfig::with_workers(2), succeed).unwrap();
    let stats = pool.stats();
    for job in 0..20 {
        pool.submit(job).await.unwrap();
    }

    let err = pool.stop().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InjectedFault);
    assert!(err.detail().unwrap().contains("boom"));

    let report = stats.report();
    assert_eq!(report.processed, 20);
    assert_eq!(report.discarded, 0);

    scenario.teardown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn every_worker_failing_leaves_no_job_behind() {
    init_test_tracing();
    let scenario = FailScenario::setup();
    fail::cfg(WORKER_POOL__BEFORE_JOB, "return").unwrap();

    let pool = WorkerPool::start(&WorkerPoolConfig::with_workers(3), succeed).unwrap();
    let stats = pool.stats();
    for job in 0..10 {
        pool.submit(job).await.unwrap();
    }

    let err = pool.stop().await.unwrap_err();
    assert_eq!(err.kinds(), vec![ErrorKind::InjectedFault; 3]);

    let report = stats.report();
    assert_eq!(report.processed, 0);
    assert_eq!(report.discarded, 10);

    scenario.teardown();
}
