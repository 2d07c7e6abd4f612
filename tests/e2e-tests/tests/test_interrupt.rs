//! Cancelling the run window still produces a report, with the sampler's
//! histogram flushed.

use e2e_tests::{fast_config, init_tracing, testexe_load, test_system};
use rtbench_common::ChannelId;
use rtbench_orchestrator::run_benchmark;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_interrupted_run_reports() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_secs(600), 1);
    config.loads.push(testexe_load("busy", &[]));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(800)).await;
        trigger.cancel();
    });

    let report = run_benchmark(&config, &test_system(1), &cancel).await.unwrap();
    assert!(report.run.interrupted);
    assert!(report.run.elapsed < Duration::from_secs(60));
    assert_eq!(report.run.requested, Duration::from_secs(600));
    assert!(report.channel(ChannelId::System).unwrap().stats.samples > 0);
}
