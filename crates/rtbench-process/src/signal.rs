//! Signal delivery to worker process groups.

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use rtbench_common::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The signal a worker sends first when asked to stop.
///
/// Interactive tools such as cyclictest flush their output on SIGINT, build
/// systems clean up on SIGTERM, and stateless stressors are simply killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StopSignal {
    #[default]
    Interrupt,
    Terminate,
    Kill,
}

impl StopSignal {
    pub fn as_signal(&self) -> Signal {
        match self {
            StopSignal::Interrupt => Signal::SIGINT,
            StopSignal::Terminate => Signal::SIGTERM,
            StopSignal::Kill => Signal::SIGKILL,
        }
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_signal().as_str())
    }
}

/// Send `signal` to every process in the group led by `pgid`.
///
/// A group that no longer exists is not an error: the caller wanted it
/// gone and it is.
pub fn signal_group(pgid: u32, signal: StopSignal) -> ProcessResult<()> {
    match killpg(Pid::from_raw(pgid as i32), signal.as_signal()) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(ProcessError::signal_failed(
            pgid.to_string(),
            format!("{} failed: {}", signal, e),
        )),
    }
}

/// Force kill a whole process group with SIGKILL.
pub fn force_kill_group(pgid: u32) -> ProcessResult<()> {
    signal_group(pgid, StopSignal::Kill)
        .map_err(|e| ProcessError::stop_failed(pgid.to_string(), e.to_string()))
}
