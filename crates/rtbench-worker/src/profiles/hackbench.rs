use crate::profile::LoadProfile;
use crate::profiles::require_executable;
use crate::spec::{SystemResources, WorkerSpec};
use async_trait::async_trait;
use rtbench_common::BenchResult;
use rtbench_process::{CommandLine, StopSignal};
use tracing::{info, warn};

/// Below this much memory per CPU hackbench is not run at all.
const MIN_GIB_PER_CPU: f64 = 0.20;

/// Scheduler stress: groups of processes passing messages over pipes.
#[derive(Debug, Clone)]
pub struct HackbenchProfile {
    executable: String,
    jobs_per_core: u32,
    loops: u32,
    datasize: u32,
    jobs: usize,
}

impl Default for HackbenchProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl HackbenchProfile {
    pub fn new() -> Self {
        Self {
            executable: "hackbench".to_string(),
            jobs_per_core: 5,
            loops: 100,
            datasize: 100,
            jobs: 0,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_jobs_per_core(mut self, jobs_per_core: u32) -> Self {
        self.jobs_per_core = jobs_per_core;
        self
    }

    pub fn with_loops(mut self, loops: u32) -> Self {
        self.loops = loops;
        self
    }

    pub fn with_datasize(mut self, datasize: u32) -> Self {
        self.datasize = datasize;
        self
    }

    /// Number of hackbench groups for `system`; 0 on a low-memory machine.
    pub fn jobs_for(&self, system: &SystemResources) -> usize {
        if system.memory_per_cpu_gib() >= MIN_GIB_PER_CPU {
            system.num_cpus * self.jobs_per_core as usize
        } else {
            0
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }
}

#[async_trait]
impl LoadProfile for HackbenchProfile {
    fn kind(&self) -> &'static str {
        "hackbench"
    }

    fn stop_signal(&self) -> StopSignal {
        StopSignal::Kill
    }

    async fn setup(&mut self, spec: &WorkerSpec) -> BenchResult<()> {
        self.jobs = self.jobs_for(&spec.system);
        if self.jobs == 0 {
            warn!(
                worker = %spec.name,
                "Low memory system ({:.2} GiB/core), hackbench will not run",
                spec.system.memory_per_cpu_gib()
            );
            return Ok(());
        }
        require_executable(spec.name.as_str(), &self.executable)?;
        info!(worker = %spec.name, jobs = self.jobs, "hackbench configured");
        Ok(())
    }

    fn command(&self, _spec: &WorkerSpec) -> Option<CommandLine> {
        if self.jobs == 0 {
            return None;
        }
        Some(
            CommandLine::new(&self.executable)
                .arg("-P")
                .args(["-g".to_string(), self.jobs.to_string()])
                .args(["-l".to_string(), self.loops.to_string()])
                .args(["-s".to_string(), self.datasize.to_string()]),
        )
    }
}
