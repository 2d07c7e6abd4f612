//! One-call benchmark run from a [`BenchConfig`].

use crate::config::validation::SAMPLER_NAME;
use crate::config::{BenchConfig, LoadConfig, LoadKind};
use crate::orchestrator::{Orchestrator, OrchestratorOptions};
use crate::report::{make_report_dir, BenchmarkReport};
use crate::system::SystemInfo;
use chrono::Local;
use rtbench_common::BenchResult;
use rtbench_worker::{
    CommandProfile, CyclictestProfile, HackbenchProfile, KcompileProfile, LoadProfile, Worker,
    WorkerOptions, WorkerSpec,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Directory under the workdir where loads unpack and build their inputs.
pub const BUILD_DIR_NAME: &str = "rtbench-build";

fn load_profile(load: &LoadConfig) -> Box<dyn LoadProfile> {
    match load.kind {
        LoadKind::Hackbench => {
            let mut profile = HackbenchProfile::new();
            if let Some(exe) = &load.executable {
                profile = profile.with_executable(exe.as_str());
            }
            if let Some(jobs) = load.jobs_per_core {
                profile = profile.with_jobs_per_core(jobs);
            }
            if let Some(loops) = load.loops {
                profile = profile.with_loops(loops);
            }
            if let Some(datasize) = load.datasize {
                profile = profile.with_datasize(datasize);
            }
            Box::new(profile)
        }
        LoadKind::Kcompile => {
            let mut profile = KcompileProfile::new();
            if let Some(jobs) = load.jobs_per_core {
                profile = profile.with_jobs_per_core(jobs);
            }
            if let Some(tarball) = &load.tarball {
                profile = profile.with_tarball(tarball.as_str());
            }
            Box::new(profile)
        }
        LoadKind::Command => {
            // validation guarantees an executable
            let exe = load.executable.clone().unwrap_or_default();
            let mut profile = CommandProfile::new(exe).with_args(load.args.iter().cloned());
            if let Some(signal) = load.stop_signal {
                profile = profile.with_stop_signal(signal);
            }
            Box::new(profile)
        }
    }
}

/// Build the loads, and unless `only_load` is set the sampler, for one run.
pub fn build_workers(
    config: &BenchConfig,
    system: &SystemInfo,
    builddir: &Path,
    reportdir: &Path,
) -> Vec<Worker> {
    let resources = system.resources();
    let options = WorkerOptions {
        restart_interval: config.orchestrator.restart_interval,
        ..Default::default()
    };
    let spec_for = |name: &str| {
        Arc::new(
            WorkerSpec::new(name, resources.clone())
                .with_dirs(builddir, &config.run.srcdir, reportdir)
                .with_logging(config.run.logging)
                .with_grace_period(config.run.grace_period),
        )
    };

    let mut workers: Vec<Worker> = config
        .loads
        .iter()
        .map(|load| Worker::new(spec_for(&load.name), load_profile(load)).with_options(options.clone()))
        .collect();

    if !config.run.only_load {
        let sampler = CyclictestProfile::new(config.sampler.tunables())
            .with_executable(config.sampler.executable.as_str());
        workers.push(Worker::new(spec_for(SAMPLER_NAME), Box::new(sampler)).with_options(options));
    }
    workers
}

/// Prepare the directories, run every configured worker for the configured
/// duration and return the reduced report.
///
/// Fatal errors have already stopped all workers when they are returned.
pub async fn run_benchmark(
    config: &BenchConfig,
    system: &SystemInfo,
    cancel: &CancellationToken,
) -> BenchResult<BenchmarkReport> {
    let reportdir = make_report_dir(&config.run.workdir, Local::now().date_naive())?;
    let builddir = config.run.workdir.join(BUILD_DIR_NAME);
    tokio::fs::create_dir_all(&builddir).await?;
    info!(
        report_dir = %reportdir.display(),
        build_dir = %builddir.display(),
        "Preparing benchmark on {} cpus ({})",
        system.num_cpus,
        system.cpu_model
    );

    let mut orchestrator = Orchestrator::new(OrchestratorOptions::from(&config.orchestrator));
    for worker in build_workers(config, system, &builddir, &reportdir) {
        orchestrator.add_worker(worker);
    }

    let mut report = orchestrator.run(config.run.duration, cancel).await?;
    report.system = Some(system.clone());
    report.report_dir = Some(reportdir);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtbench_common::WorkerRole;
    use std::time::Duration;

    fn system() -> SystemInfo {
        SystemInfo {
            hostname: Some("bench".to_string()),
            kernel_version: Some("6.6.0-rt".to_string()),
            num_cpus: 2,
            cpu_model: "Test CPU".to_string(),
            memory_bytes: 8 << 30,
            numa_nodes: 1,
        }
    }

    #[test]
    fn test_default_workers() {
        let config = BenchConfig::default();
        let workers = build_workers(&config, &system(), Path::new("/b"), Path::new("/r"));
        let names: Vec<_> = workers.iter().map(|w| w.name().to_string()).collect();
        assert_eq!(names, vec!["hackbench", "kcompile", SAMPLER_NAME]);
        assert_eq!(workers[2].role(), WorkerRole::Sampler);
        assert_eq!(workers[0].kind(), "hackbench");
        assert_eq!(workers[1].kind(), "kcompile");
    }

    #[test]
    fn test_only_load_has_no_sampler() {
        let mut config = BenchConfig::default();
        config.run.only_load = true;
        let workers = build_workers(&config, &system(), Path::new("/b"), Path::new("/r"));
        assert!(workers.iter().all(|w| w.role() == WorkerRole::ContinuousLoad));
        assert_eq!(workers.len(), 2);
    }

    #[test]
    fn test_logging_exposes_log_paths() {
        let mut config = BenchConfig::default();
        config.run.logging = true;
        let workers = build_workers(&config, &system(), Path::new("/b"), Path::new("/r"));
        let paths = workers[0].log_paths().unwrap();
        assert_eq!(paths.stdout, Path::new("/r/logs/hackbench.stdout"));
        assert_eq!(workers[2].log_paths(), None);
    }

    #[tokio::test]
    async fn test_only_load_command_run() {
        let work = tempfile::tempdir().unwrap();
        let yaml = format!(
            "run:\n  duration: 300ms\n  workdir: {}\n  only_load: true\n\
             orchestrator:\n  poll_interval: 20ms\n  restart_interval: 50ms\n\
             loads:\n  - name: ticker\n    kind: command\n    executable: sh\n    args: [\"-c\", \"sleep 0.05\"]\n",
            work.path().display()
        );
        let config = BenchConfig::load_from_string(&yaml).unwrap();

        let report = run_benchmark(&config, &system(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.channels.is_empty());
        assert!(report.run.elapsed >= Duration::from_millis(300));
        let ticker = report.worker("ticker").unwrap();
        assert_eq!(ticker.command.as_deref(), Some("sh -c sleep 0.05"));
        assert!(ticker.restarts >= 1);

        let dir = report.report_dir.unwrap();
        assert!(dir.join("logs").is_dir());
        assert!(work.path().join(BUILD_DIR_NAME).is_dir());
    }
}
