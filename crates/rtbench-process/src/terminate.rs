//! Bounded termination of a worker subprocess.
//!
//! The sequence is: graceful signal to the process group, wait up to the
//! grace period, SIGKILL the group, wait up to [`FORCE_KILL_TIMEOUT`]. The
//! child is reaped through its `tokio` handle on every path that returns
//! `Ok`, so no zombie is left behind.

use crate::check::process_group_exists;
use crate::signal::{force_kill_group, signal_group, StopSignal};
use rtbench_common::{ProcessError, ProcessResult};
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub const FORCE_KILL_TIMEOUT: Duration = Duration::from_secs(3);

/// How a child ended up stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The child had already exited before any signal was sent.
    AlreadyExited(ExitStatus),
    /// The child exited within the grace period.
    Graceful(ExitStatus),
    /// The child needed SIGKILL.
    ForceKilled(ExitStatus),
}

impl StopOutcome {
    pub fn status(&self) -> ExitStatus {
        match self {
            StopOutcome::AlreadyExited(s) | StopOutcome::Graceful(s) | StopOutcome::ForceKilled(s) => *s,
        }
    }

    pub fn was_forced(&self) -> bool {
        matches!(self, StopOutcome::ForceKilled(_))
    }
}

/// SIGKILL whatever is left of a group whose leader has exited.
///
/// Background jobs of a shell ignore SIGINT, so a graceful stop can leave
/// them behind after the leader is gone.
fn sweep_group(id: &str, pgid: u32) {
    match process_group_exists(pgid) {
        Ok(true) => {
            debug!(worker = id, pgid, "Killing leftover group members");
            if let Err(e) = force_kill_group(pgid) {
                warn!(worker = id, pgid, "Failed to kill leftover group members: {}", e);
            }
        }
        Ok(false) => {}
        Err(e) => warn!(worker = id, pgid, "{}", e),
    }
}

/// Stop `child`, escalating to SIGKILL after `grace`.
pub async fn stop_child(
    id: &str,
    child: &mut Child,
    signal: StopSignal,
    grace: Duration,
) -> ProcessResult<StopOutcome> {
    if let Some(status) = child
        .try_wait()
        .map_err(|e| ProcessError::stop_failed(id, e.to_string()))?
    {
        debug!(worker = id, %status, "Child already exited");
        return Ok(StopOutcome::AlreadyExited(status));
    }

    let pid = match child.id() {
        Some(pid) => pid,
        None => {
            let status = child
                .wait()
                .await
                .map_err(|e| ProcessError::stop_failed(id, e.to_string()))?;
            return Ok(StopOutcome::AlreadyExited(status));
        }
    };

    info!(worker = id, pid, "Sending {} to process group", signal);
    if let Err(e) = signal_group(pid, signal) {
        warn!(worker = id, pid, "Failed to deliver {}: {}", signal, e);
    }

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(worker = id, pid, %status, "Child exited after {}", signal);
            sweep_group(id, pid);
            return Ok(StopOutcome::Graceful(status));
        }
        Ok(Err(e)) => return Err(ProcessError::stop_failed(id, e.to_string())),
        Err(_) => {
            warn!(
                worker = id,
                pid,
                "Graceful stop timed out after {:?}, force killing",
                grace
            );
        }
    }

    if let Err(e) = force_kill_group(pid) {
        error!(worker = id, pid, "Force kill failed: {}", e);
    }

    match timeout(FORCE_KILL_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => {
            info!(worker = id, pid, "Child terminated after force kill");
            sweep_group(id, pid);
            Ok(StopOutcome::ForceKilled(status))
        }
        Ok(Err(e)) => Err(ProcessError::stop_failed(id, e.to_string())),
        Err(_) => Err(ProcessError::timeout(
            id,
            format!(
                "stop (did not exit after grace period {:?} + force-kill timeout {:?})",
                grace, FORCE_KILL_TIMEOUT
            ),
        )),
    }
}
