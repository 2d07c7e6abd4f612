use crate::profile::LoadProfile;
use crate::profiles::require_executable;
use crate::spec::WorkerSpec;
use async_trait::async_trait;
use rtbench_common::BenchResult;
use rtbench_process::{CommandLine, StopSignal};

/// An arbitrary executable kept running as a continuous load.
#[derive(Debug, Clone)]
pub struct CommandProfile {
    executable: String,
    args: Vec<String>,
    stop_signal: StopSignal,
}

impl CommandProfile {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            stop_signal: StopSignal::Interrupt,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stop_signal(mut self, signal: StopSignal) -> Self {
        self.stop_signal = signal;
        self
    }
}

#[async_trait]
impl LoadProfile for CommandProfile {
    fn kind(&self) -> &'static str {
        "command"
    }

    fn stop_signal(&self) -> StopSignal {
        self.stop_signal
    }

    async fn setup(&mut self, spec: &WorkerSpec) -> BenchResult<()> {
        require_executable(spec.name.as_str(), &self.executable)
    }

    fn command(&self, _spec: &WorkerSpec) -> Option<CommandLine> {
        Some(CommandLine::new(&self.executable).args(self.args.iter().cloned()))
    }
}
