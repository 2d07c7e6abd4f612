//! Immutable worker configuration.

use rtbench_common::WorkerName;
use rtbench_process::ChildOutput;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// What the machine under test looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemResources {
    pub num_cpus: usize,
    pub memory_bytes: u64,
    pub numa_nodes: usize,
    pub cpu_description: String,
}

impl SystemResources {
    /// GiB of memory per online CPU.
    pub fn memory_per_cpu_gib(&self) -> f64 {
        if self.num_cpus == 0 {
            return 0.0;
        }
        self.memory_bytes as f64 / GIB / self.num_cpus as f64
    }
}

/// Sampler tunables, with the defaults cyclictest is normally run with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerTunables {
    pub interval: u32,
    pub distance: u32,
    pub buckets: u32,
    pub priority: u32,
    pub threads: Option<u32>,
}

impl Default for SamplerTunables {
    fn default() -> Self {
        Self {
            interval: 100,
            distance: 0,
            buckets: 2000,
            priority: 95,
            threads: None,
        }
    }
}

/// Stdout/stderr log files of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPaths {
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

/// Everything a worker needs to know, fixed before the run starts.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub name: WorkerName,
    pub builddir: PathBuf,
    pub srcdir: PathBuf,
    pub reportdir: PathBuf,
    pub system: SystemResources,
    pub logging: bool,
    pub grace_period: Duration,
}

impl WorkerSpec {
    pub fn new(name: impl Into<WorkerName>, system: SystemResources) -> Self {
        Self {
            name: name.into(),
            builddir: PathBuf::from("."),
            srcdir: PathBuf::from("."),
            reportdir: PathBuf::from("."),
            system,
            logging: false,
            grace_period: Duration::from_secs(2),
        }
    }

    pub fn with_dirs(
        mut self,
        builddir: impl Into<PathBuf>,
        srcdir: impl Into<PathBuf>,
        reportdir: impl Into<PathBuf>,
    ) -> Self {
        self.builddir = builddir.into();
        self.srcdir = srcdir.into();
        self.reportdir = reportdir.into();
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Log files named after `stem` under `<reportdir>/logs`.
    pub fn log_paths_for(&self, stem: &str) -> LogPaths {
        let logs = self.reportdir.join("logs");
        LogPaths {
            stdout: logs.join(format!("{}.stdout", stem)),
            stderr: logs.join(format!("{}.stderr", stem)),
        }
    }

    /// The worker's own log files, when logging is enabled.
    pub fn log_paths(&self) -> Option<LogPaths> {
        self.logging.then(|| self.log_paths_for(self.name.as_str()))
    }

    /// Output routing for the worker's load subprocess.
    pub fn child_output(&self) -> ChildOutput {
        match self.log_paths() {
            Some(paths) => ChildOutput::Append {
                stdout: paths.stdout,
                stderr: paths.stderr,
            },
            None => ChildOutput::Discard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system(cpus: usize, gib: u64) -> SystemResources {
        SystemResources {
            num_cpus: cpus,
            memory_bytes: gib * 1024 * 1024 * 1024,
            numa_nodes: 1,
            cpu_description: "cpu".to_string(),
        }
    }

    #[test]
    fn test_memory_per_cpu() {
        assert_eq!(system(4, 8).memory_per_cpu_gib(), 2.0);
        assert_eq!(system(0, 8).memory_per_cpu_gib(), 0.0);
    }

    #[test]
    fn test_log_paths_follow_logging_flag() {
        let spec = WorkerSpec::new("hackbench", system(1, 1)).with_dirs("/b", "/s", "/r");
        assert_eq!(spec.log_paths(), None);
        assert_eq!(spec.child_output(), ChildOutput::Discard);

        let spec = spec.with_logging(true);
        let paths = spec.log_paths().unwrap();
        assert_eq!(paths.stdout, PathBuf::from("/r/logs/hackbench.stdout"));
        assert_eq!(paths.stderr, PathBuf::from("/r/logs/hackbench.stderr"));
        assert!(matches!(spec.child_output(), ChildOutput::Append { .. }));
    }
}
