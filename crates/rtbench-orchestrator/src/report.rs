//! The finished run as a value object, plus the report directory layout.

use crate::system::SystemInfo;
use chrono::{DateTime, NaiveDate, Utc};
use rtbench_common::{ChannelId, WorkerName, WorkerRole};
use rtbench_histogram::ChannelReport;
use rtbench_worker::{LogPaths, WorkerOutcome};
use rtbench_worker_state::WorkerState;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing of the measurement window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub requested: Duration,
    pub elapsed: Duration,
    /// The window was cut short by cancellation.
    pub interrupted: bool,
    pub mean_load_average: Option<f64>,
    pub load_samples: u32,
}

/// What one worker did during the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerSummary {
    pub name: WorkerName,
    pub role: WorkerRole,
    pub final_state: WorkerState,
    pub command: Option<String>,
    pub spawns: u32,
    pub restarts: u32,
    pub log_paths: Option<LogPaths>,
    /// Set when the worker could not be joined cleanly.
    pub error: Option<String>,
}

impl From<&WorkerOutcome> for WorkerSummary {
    fn from(outcome: &WorkerOutcome) -> Self {
        Self {
            name: outcome.name.clone(),
            role: outcome.role,
            final_state: outcome.final_state,
            command: outcome.command.clone(),
            spawns: outcome.spawns,
            restarts: outcome.restarts,
            log_paths: outcome.log_paths.clone(),
            error: None,
        }
    }
}

/// A worker that outlived its join timeout and had to be aborted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutdownTimeoutRecord {
    pub worker: WorkerName,
    pub waited: Duration,
}

/// Result of a complete benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub run: RunMetadata,
    pub system: Option<SystemInfo>,
    pub report_dir: Option<PathBuf>,
    pub workers: Vec<WorkerSummary>,
    /// System channel first, then cores. Empty for a load-only run.
    pub channels: Vec<ChannelReport>,
    pub shutdown_timeouts: Vec<ShutdownTimeoutRecord>,
}

impl BenchmarkReport {
    pub fn channel(&self, id: ChannelId) -> Option<&ChannelReport> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn worker(&self, name: &str) -> Option<&WorkerSummary> {
        self.workers.iter().find(|w| w.name.as_str() == name)
    }
}

impl fmt::Display for BenchmarkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let run = &self.run;
        writeln!(
            f,
            "Run: {}s of {}s{}",
            run.elapsed.as_secs(),
            run.requested.as_secs(),
            if run.interrupted { " (interrupted)" } else { "" }
        )?;
        if let Some(system) = &self.system {
            writeln!(
                f,
                "System: {} cpus, {} MiB, {}",
                system.num_cpus,
                system.memory_bytes / (1024 * 1024),
                system.cpu_model
            )?;
        }
        if let Some(load) = run.mean_load_average {
            writeln!(f, "Average load: {:.2} ({} samples)", load, run.load_samples)?;
        }
        if let Some(dir) = &self.report_dir {
            writeln!(f, "Report directory: {}", dir.display())?;
        }

        for worker in &self.workers {
            write!(
                f,
                "  {:<12} {:<8} {:<8} spawns={} restarts={}",
                worker.name.as_str(),
                worker.role.as_str(),
                worker.final_state.to_string(),
                worker.spawns,
                worker.restarts
            )?;
            if let Some(command) = &worker.command {
                write!(f, "  '{}'", command)?;
            }
            writeln!(f)?;
        }
        for timeout in &self.shutdown_timeouts {
            writeln!(f, "  {} did not stop within {:?}", timeout.worker, timeout.waited)?;
        }

        if !self.channels.is_empty() {
            writeln!(
                f,
                "{:<10} {:>8} {:>6} {:>6} {:>9} {:>6} {:>8} {:>9} {:>9}",
                "channel", "samples", "min", "max", "mean", "mode", "median", "mad", "stddev"
            )?;
        }
        for channel in &self.channels {
            let s = &channel.stats;
            if s.samples == 0 {
                writeln!(f, "{:<10} {:>8}", channel.id.to_string(), 0)?;
                continue;
            }
            writeln!(
                f,
                "{:<10} {:>8} {:>6} {:>6} {:>9.2} {:>6} {:>8.1} {:>9.2} {:>9.2}",
                channel.id.to_string(),
                s.samples,
                s.min,
                s.max,
                s.mean,
                s.mode,
                s.median,
                s.mad,
                s.stddev
            )?;
        }
        Ok(())
    }
}

/// Create `<workdir>/rtbench-YYYYMMDD-N` for the first free N, with a
/// `logs/` subdirectory.
pub fn make_report_dir(workdir: &Path, date: NaiveDate) -> io::Result<PathBuf> {
    let stem = format!("rtbench-{}", date.format("%Y%m%d"));
    std::fs::create_dir_all(workdir)?;

    let mut n: u32 = 1;
    loop {
        let dir = workdir.join(format!("{}-{}", stem, n));
        match std::fs::create_dir(&dir) {
            Ok(()) => {
                std::fs::create_dir(dir.join("logs"))?;
                return Ok(dir);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}
