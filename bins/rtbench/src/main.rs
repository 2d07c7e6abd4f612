use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use rtbench_common::BenchError;
use rtbench_orchestrator::config::parse_duration;
use rtbench_orchestrator::{run_benchmark, BenchConfig, Overrides, SystemInfo};

/// Real-time latency benchmark
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Length of the measurement window, e.g. 90s, 10m, 12h
    #[arg(short = 'D', long, value_parser = parse_duration)]
    duration: Option<Duration>,

    /// Directory for report and build directories
    #[arg(short, long, value_name = "DIR")]
    workdir: Option<PathBuf>,

    /// Directory holding load sources (kernel tarball)
    #[arg(short = 'l', long, value_name = "DIR")]
    loaddir: Option<PathBuf>,

    /// Append each load's stdout/stderr to the report's logs directory
    #[arg(short = 'L', long)]
    logging: bool,

    /// Run the loads only, without the latency sampler
    #[arg(short = 'O', long)]
    onlyload: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Write the report as JSON to FILE
    #[arg(long, value_name = "FILE")]
    json: Option<PathBuf>,

    /// Sampler wakeup interval in microseconds
    #[arg(long)]
    sampler_interval: Option<u32>,

    /// Sampler interval increment between threads in microseconds
    #[arg(long)]
    sampler_distance: Option<u32>,

    /// Number of histogram buckets
    #[arg(long)]
    sampler_buckets: Option<u32>,

    /// Sampler thread priority
    #[arg(long)]
    sampler_priority: Option<u32>,

    /// hackbench jobs per CPU core
    #[arg(long = "hackbench-jobspercore")]
    hackbench_jobs_per_core: Option<u32>,

    /// kcompile jobs per CPU core
    #[arg(long = "kcompile-jobspercore")]
    kcompile_jobs_per_core: Option<u32>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            duration: self.duration,
            workdir: self.workdir.clone(),
            srcdir: self.loaddir.clone(),
            logging: self.logging,
            only_load: self.onlyload,
            sampler_interval: self.sampler_interval,
            sampler_distance: self.sampler_distance,
            sampler_buckets: self.sampler_buckets,
            sampler_priority: self.sampler_priority,
            hackbench_jobs_per_core: self.hackbench_jobs_per_core,
            kcompile_jobs_per_core: self.kcompile_jobs_per_core,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.debug)?;

    let mut config = match &args.config {
        Some(path) => {
            info!("Config file: {}", path.display());
            BenchConfig::load_from_file(path)?
        }
        None => BenchConfig::default(),
    };
    config.apply_overrides(&args.overrides())?;

    let system = SystemInfo::probe();
    info!(
        "Benchmarking {} ({} cpus, {} MiB) for {:?} with {} load(s){}",
        system.hostname.as_deref().unwrap_or("localhost"),
        system.num_cpus,
        system.memory_bytes / (1024 * 1024),
        config.run.duration,
        config.loads.len(),
        if config.run.only_load { ", no sampler" } else { "" }
    );

    let cancel = CancellationToken::new();
    setup_signal_handlers(cancel.clone())?;

    let report = match run_benchmark(&config, &system, &cancel).await {
        Ok(report) => report,
        Err(BenchError::Interrupted) => {
            warn!("Interrupted before the measurement started");
            return Err(BenchError::Interrupted.into());
        }
        Err(e) => {
            error!("Benchmark failed: {}", e);
            return Err(e.into());
        }
    };

    print!("{}", report);

    if let Some(path) = &args.json {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create JSON report: {}", path.display()))?;
        serde_json::to_writer_pretty(file, &report).context("Failed to write JSON report")?;
        info!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn initialize_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}

/// Cancel `cancel` on the first SIGINT or SIGTERM.
fn setup_signal_handlers(cancel: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
        cancel.cancel();
    });

    Ok(())
}
