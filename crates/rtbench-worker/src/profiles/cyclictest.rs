use crate::profile::LoadProfile;
use crate::profiles::require_executable;
use crate::spec::{SamplerTunables, WorkerSpec};
use async_trait::async_trait;
use rtbench_common::{BenchResult, WorkerRole};
use rtbench_histogram::ChannelSet;
use rtbench_process::{CommandLine, StopSignal};

/// The latency sampler. Prints its histogram on SIGINT.
#[derive(Debug, Clone)]
pub struct CyclictestProfile {
    executable: String,
    tunables: SamplerTunables,
}

impl Default for CyclictestProfile {
    fn default() -> Self {
        Self::new(SamplerTunables::default())
    }
}

impl CyclictestProfile {
    pub fn new(tunables: SamplerTunables) -> Self {
        Self {
            executable: "cyclictest".to_string(),
            tunables,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn tunables(&self) -> &SamplerTunables {
        &self.tunables
    }

    /// Number of measurement threads, one histogram column each.
    pub fn thread_count(&self, spec: &WorkerSpec) -> usize {
        self.tunables
            .threads
            .map(|t| t as usize)
            .unwrap_or(spec.system.num_cpus)
    }
}

#[async_trait]
impl LoadProfile for CyclictestProfile {
    fn kind(&self) -> &'static str {
        "cyclictest"
    }

    fn role(&self) -> WorkerRole {
        WorkerRole::Sampler
    }

    fn stop_signal(&self) -> StopSignal {
        StopSignal::Interrupt
    }

    async fn setup(&mut self, spec: &WorkerSpec) -> BenchResult<()> {
        require_executable(spec.name.as_str(), &self.executable)
    }

    fn command(&self, spec: &WorkerSpec) -> Option<CommandLine> {
        let t = &self.tunables;
        let mode = if spec.system.numa_nodes > 1 {
            "--numa"
        } else {
            "--smp"
        };
        let mut cmd = CommandLine::new(&self.executable).args([
            "-q".to_string(),
            "-m".to_string(),
            format!("-i{}", t.interval),
            format!("-d{}", t.distance),
            format!("-h{}", t.buckets),
            format!("-p{}", t.priority),
            mode.to_string(),
        ]);
        if let Some(threads) = t.threads {
            cmd = cmd.arg(format!("-t{}", threads));
        }
        Some(cmd)
    }

    fn channels(&self, spec: &WorkerSpec) -> Option<ChannelSet> {
        Some(ChannelSet::new(
            self.thread_count(spec),
            &spec.system.cpu_description,
            self.tunables.priority,
        ))
    }
}
