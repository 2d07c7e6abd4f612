//! A continuous load that keeps exiting is restarted for the whole run.

use e2e_tests::{fast_config, init_tracing, testexe_load, test_system};
use rtbench_orchestrator::run_benchmark;
use rtbench_worker_state::WorkerState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_exiting_load_is_restarted() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_millis(1500), 1);
    config.run.only_load = true;
    config.loads.push(testexe_load(
        "flaky",
        &[
            "--run-duration-ms".to_string(),
            "100".to_string(),
            "--exit-code".to_string(),
            "3".to_string(),
        ],
    ));

    let report = run_benchmark(&config, &test_system(1), &CancellationToken::new())
        .await
        .unwrap();
    let flaky = report.worker("flaky").unwrap();
    assert!(flaky.restarts >= 2, "restarts: {}", flaky.restarts);
    assert!(flaky.spawns >= flaky.restarts);
    assert_eq!(flaky.final_state, WorkerState::Stopped);
    assert!(report.channels.is_empty());
}
