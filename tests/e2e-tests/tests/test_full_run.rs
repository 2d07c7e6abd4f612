//! A complete run with a load and the sampler, reduced to channel
//! statistics.

use e2e_tests::{fast_config, init_tracing, testexe_load, test_system};
use rtbench_common::ChannelId;
use rtbench_orchestrator::{run_benchmark, BenchmarkReport};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_full_run_produces_channel_statistics() {
    init_tracing();
    let work = tempfile::tempdir().unwrap();
    let mut config = fast_config(work.path(), Duration::from_secs(1), 2);
    config.run.logging = true;
    config.loads.push(testexe_load("busy", &[]));

    let report = run_benchmark(&config, &test_system(2), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!report.run.interrupted);
    assert!(report.run.elapsed >= Duration::from_secs(1));
    assert!(report.run.load_samples >= 1);

    let ids: Vec<_> = report.channels.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![ChannelId::System, ChannelId::Core(0), ChannelId::Core(1)]);

    let system = report.channel(ChannelId::System).unwrap();
    let core_total: u64 = report
        .channels
        .iter()
        .filter(|c| !c.id.is_system())
        .map(|c| c.stats.samples)
        .sum();
    assert!(system.stats.samples > 0);
    assert_eq!(system.stats.samples, core_total);
    for channel in &report.channels {
        let stats = &channel.stats;
        assert!(stats.min >= 1 && stats.max <= 17, "{}: {:?}", channel.id, stats);
        assert!(stats.min as f64 <= stats.median && stats.median <= stats.max as f64);
        assert_eq!(channel.priority, 95);
    }
    assert_eq!(system.description, "(2 cores) E2E Test CPU");
    assert_eq!(report.channel(ChannelId::Core(1)).unwrap().description, "E2E Test CPU");

    let sampler = report.worker("cyclictest").unwrap();
    let command = sampler.command.as_deref().unwrap();
    assert!(command.ends_with("-q -m -i100 -d0 -h100 -p95 --smp -t2"), "{}", command);

    let report_dir = report.report_dir.clone().unwrap();
    assert!(report_dir
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("rtbench-"));
    let busy = report.worker("busy").unwrap();
    let logs = busy.log_paths.clone().unwrap();
    assert!(logs.stdout.starts_with(report_dir.join("logs")));
    assert!(logs.stdout.exists());
    assert!(logs.stderr.exists());

    let json = serde_json::to_string_pretty(&report).unwrap();
    let back: BenchmarkReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back.workers, report.workers);
    assert_eq!(back.channels.len(), 3);
    assert_eq!(back.channels[0].stats.samples, system.stats.samples);
}
