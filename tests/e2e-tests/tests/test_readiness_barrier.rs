//! No load starts before every worker is ready, and all start once the
//! gate opens.

use e2e_tests::{fast_config, init_tracing, testexe_load, test_system, wait_for_pid_file};
use rtbench_orchestrator::{build_workers, Orchestrator, OrchestratorOptions};
use rtbench_worker_state::WorkerState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_loads_start_together() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_millis(500), 1);
    config.run.only_load = true;

    let pid_files: Vec<_> = (0..3)
        .map(|i| work.path().join(format!("load{}.pid", i)))
        .collect();
    for (i, pid_file) in pid_files.iter().enumerate() {
        config.loads.push(testexe_load(
            &format!("load{}", i),
            &["--pid-file".to_string(), pid_file.display().to_string()],
        ));
    }

    let mut orch = Orchestrator::new(OrchestratorOptions::from(&config.orchestrator));
    for worker in build_workers(&config, &test_system(1), work.path(), work.path()) {
        orch.add_worker(worker);
    }
    orch.start_all(&CancellationToken::new()).await.unwrap();

    let observers = orch.observers();
    assert_eq!(observers.len(), 3);
    assert!(observers.iter().all(|o| o.is_ready()));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(observers.iter().all(|o| o.state() == WorkerState::AwaitingStart));
    assert!(pid_files.iter().all(|p| !p.exists()), "a load started before the gate opened");

    let run = orch
        .run_for(Duration::from_millis(500), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!run.interrupted);
    for pid_file in &pid_files {
        assert!(wait_for_pid_file(pid_file, Duration::from_secs(1)).await.is_some());
    }
    assert!(observers.iter().all(|o| o.state() == WorkerState::Running));

    orch.stop_all().await.unwrap();
    assert!(observers.iter().all(|o| o.state() == WorkerState::Stopped));
}
