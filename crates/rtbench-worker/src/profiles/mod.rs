//! Built-in load profiles.

mod command;
mod cyclictest;
mod hackbench;
mod kcompile;

pub use command::CommandProfile;
pub use cyclictest::CyclictestProfile;
pub use hackbench::HackbenchProfile;
pub use kcompile::KcompileProfile;

use rtbench_common::{BenchError, BenchResult};
use rtbench_process::{find_executable, spawn_command, ChildOutput, CommandLine};
use tracing::debug;

/// Setup check shared by profiles that run a named tool.
pub(crate) fn require_executable(worker: &str, program: &str) -> BenchResult<()> {
    match find_executable(program) {
        Some(path) => {
            debug!(worker, "Using {}", path.display());
            Ok(())
        }
        None => Err(BenchError::setup(
            worker,
            format!("executable '{}' not found", program),
        )),
    }
}

/// Run a one-shot preparation command; a non-zero exit is a `Build` error.
pub(crate) async fn run_build_step(
    worker: &str,
    cmd: &CommandLine,
    output: &ChildOutput,
) -> BenchResult<()> {
    debug!(worker, "Build step: {}", cmd);
    let mut child = spawn_command(worker, cmd, output)
        .map_err(|e| BenchError::build(worker, format!("'{}' could not start: {}", cmd, e)))?;
    let status = child.wait().await?;
    if !status.success() {
        return Err(BenchError::build(
            worker,
            format!("'{}' failed: {}", cmd, status),
        ));
    }
    Ok(())
}
