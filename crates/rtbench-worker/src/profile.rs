//! The load-specific half of a worker.

use crate::spec::WorkerSpec;
use async_trait::async_trait;
use rtbench_common::{BenchResult, WorkerRole};
use rtbench_histogram::ChannelSet;
use rtbench_process::{CommandLine, StopSignal};

/// What a worker prepares, runs and how it stops it.
///
/// `setup` and `build` run once, before the start gate opens. `command`
/// is asked once the gate opens; `None` means there is nothing to run on
/// this machine and the worker idles until stopped.
#[async_trait]
pub trait LoadProfile: Send + Sync {
    /// Short name of the load kind, e.g. `hackbench`.
    fn kind(&self) -> &'static str;

    fn role(&self) -> WorkerRole {
        WorkerRole::ContinuousLoad
    }

    /// First signal sent when stopping the subprocess.
    fn stop_signal(&self) -> StopSignal {
        StopSignal::Interrupt
    }

    /// Locate or compute inputs. Missing inputs are a `Setup` error.
    async fn setup(&mut self, _spec: &WorkerSpec) -> BenchResult<()> {
        Ok(())
    }

    /// One-time preparation. Failures are a `Build` error.
    async fn build(&mut self, _spec: &WorkerSpec) -> BenchResult<()> {
        Ok(())
    }

    fn command(&self, spec: &WorkerSpec) -> Option<CommandLine>;

    /// Channels to fill from the subprocess's stdout. Only samplers have them.
    fn channels(&self, _spec: &WorkerSpec) -> Option<ChannelSet> {
        None
    }
}
