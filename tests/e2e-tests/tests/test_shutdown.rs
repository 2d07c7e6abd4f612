//! After a run no load process, or any process it forked, is left behind,
//! including loads that ignore the graceful stop signal.

use e2e_tests::{fast_config, init_tracing, testexe_load, test_system, wait_for_exit, wait_for_pid_file};
use rtbench_orchestrator::run_benchmark;
use rtbench_worker_state::WorkerState;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_no_process_survives_shutdown() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_millis(800), 2);

    let mut pid_files = Vec::new();
    for (name, extra) in [("polite", None), ("stubborn", Some("--ignore-sigint"))] {
        let pid = work.path().join(format!("{}.pid", name));
        let child = work.path().join(format!("{}.child.pid", name));
        let mut args = vec![
            "--pid-file".to_string(),
            pid.display().to_string(),
            "--child-pid-file".to_string(),
            child.display().to_string(),
        ];
        args.extend(extra.map(str::to_string));
        config.loads.push(testexe_load(name, &args));
        pid_files.push(pid);
        pid_files.push(child);
    }

    let report = run_benchmark(&config, &test_system(2), &CancellationToken::new())
        .await
        .unwrap();
    assert!(report.shutdown_timeouts.is_empty());
    for name in ["polite", "stubborn"] {
        assert_eq!(report.worker(name).unwrap().final_state, WorkerState::Stopped);
    }

    for pid_file in &pid_files {
        let pid = wait_for_pid_file(pid_file, Duration::from_secs(1))
            .await
            .unwrap_or_else(|| panic!("no pid in {}", pid_file.display()));
        assert!(
            wait_for_exit(pid, Duration::from_secs(3)).await,
            "pid {} from {} still alive",
            pid,
            pid_file.display()
        );
    }
}
