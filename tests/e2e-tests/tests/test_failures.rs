//! Fatal errors stop every worker before they are returned.

use e2e_tests::{fast_config, get_testexe_path, init_tracing, testexe_load, test_system, wait_for_exit, wait_for_pid_file};
use rtbench_common::BenchError;
use rtbench_orchestrator::config::{LoadConfig, LoadKind};
use rtbench_orchestrator::run_benchmark;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sampler_death_ends_run() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let sampler = work.path().join("short-sampler.sh");
    std::fs::write(
        &sampler,
        format!(
            "#!/bin/sh\nexec {} --run-duration-ms 200 \"$@\"\n",
            get_testexe_path().display()
        ),
    )
    .unwrap();
    std::fs::set_permissions(&sampler, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut config = fast_config(work.path(), Duration::from_secs(30), 1);
    config.sampler.executable = sampler.display().to_string();
    let pid_file = work.path().join("load.pid");
    config.loads.push(testexe_load(
        "load",
        &["--pid-file".to_string(), pid_file.display().to_string()],
    ));

    let started = std::time::Instant::now();
    let err = run_benchmark(&config, &test_system(1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::WorkerDied { .. }), "{}", err);
    assert_eq!(err.worker(), Some("cyclictest"));
    assert!(started.elapsed() < Duration::from_secs(20));

    let pid = wait_for_pid_file(&pid_file, Duration::from_secs(1)).await.unwrap();
    assert!(wait_for_exit(pid, Duration::from_secs(3)).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_load_executable_is_setup_error() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_secs(30), 1);
    let mut load = LoadConfig::new("ghost", LoadKind::Command);
    load.executable = Some("/nonexistent/rtbench-ghost-load".to_string());
    config.loads.push(load);

    let err = run_benchmark(&config, &test_system(1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::Setup { .. }), "{}", err);
    assert_eq!(err.worker(), Some("ghost"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_kcompile_without_sources_is_setup_error() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let empty = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_secs(30), 1);
    config.run.srcdir = empty.path().to_path_buf();
    config.loads.push(LoadConfig::new("kcompile", LoadKind::Kcompile));

    let err = run_benchmark(&config, &test_system(1), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, BenchError::Setup { .. }), "{}", err);
    assert_eq!(err.worker(), Some("kcompile"));
}
