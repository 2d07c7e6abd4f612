//! Helpers shared by the rtbench end-to-end tests.

use rtbench_orchestrator::config::{BenchConfig, LoadConfig, LoadKind};
use rtbench_orchestrator::SystemInfo;
use rtbench_process::process_exists;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, Instant};

/// Get the path to the TESTEXE (testexe) binary
pub fn get_testexe_path() -> PathBuf {
    let mut path = env::current_exe()
        .expect("Failed to get current exe path")
        .parent()
        .expect("Failed to get parent dir")
        .to_path_buf();

    // If we're in deps/, go up one level
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("testexe");

    if !path.exists() {
        panic!("TESTEXE binary not found at: {}", path.display());
    }
    path
}

/// Install a test subscriber once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}

/// A fixed machine description, so runs do not depend on the host.
pub fn test_system(num_cpus: usize) -> SystemInfo {
    SystemInfo {
        hostname: Some("e2e".to_string()),
        kernel_version: None,
        num_cpus,
        cpu_model: "E2E Test CPU".to_string(),
        memory_bytes: 16 * 1024 * 1024 * 1024,
        numa_nodes: 1,
    }
}

/// A `command` load running testexe with `args`.
pub fn testexe_load(name: &str, args: &[String]) -> LoadConfig {
    let mut load = LoadConfig::new(name, LoadKind::Command);
    load.executable = Some(get_testexe_path().to_string_lossy().into_owned());
    load.args = args.to_vec();
    load
}

/// Config with fast timings, testexe as the sampler, and no loads.
pub fn fast_config(workdir: &Path, duration: Duration, threads: u32) -> BenchConfig {
    let mut config = BenchConfig::default();
    config.run.workdir = workdir.to_path_buf();
    config.run.duration = duration;
    config.run.grace_period = Duration::from_secs(2);
    config.orchestrator.poll_interval = Duration::from_millis(50);
    config.orchestrator.load_sample_interval = Duration::from_millis(200);
    config.orchestrator.restart_interval = Duration::from_millis(100);
    config.sampler.executable = get_testexe_path().to_string_lossy().into_owned();
    config.sampler.threads = Some(threads);
    config.sampler.buckets = 100;
    config.loads.clear();
    config
}

/// Read a pid written by testexe, waiting up to `timeout` for it.
pub async fn wait_for_pid_file(path: &Path, timeout: Duration) -> Option<u32> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(text) = std::fs::read_to_string(path) {
            if let Ok(pid) = text.trim().parse() {
                return Some(pid);
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

/// Whether `pid` disappears within `timeout`. Orphans need a moment to be
/// reaped by init.
pub async fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if !process_exists(pid).unwrap_or(true) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
