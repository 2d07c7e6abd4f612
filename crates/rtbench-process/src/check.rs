//! Process existence checking.

use rtbench_common::{ProcessError, ProcessResult};

/// Check if a process with the given PID exists.
///
/// Uses `kill(pid, 0)`, which delivers nothing but reports whether the
/// target exists. A zombie that has not been reaped still counts as
/// existing.
///
/// # Returns
///
/// * `Ok(true)` - process exists (including when we lack permission to signal it)
/// * `Ok(false)` - no such process
/// * `Err(_)` - the check itself failed
///
/// ```rust,no_run
/// use rtbench_process::process_exists;
///
/// if process_exists(1234).unwrap() {
///     println!("Process 1234 is running");
/// }
/// ```
pub fn process_exists(pid: u32) -> ProcessResult<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(_) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(ProcessError::check_failed(
            pid.to_string(),
            format!("Failed to check process: {}", e),
        )),
    }
}

/// Check whether any member of the process group `pgid` still exists.
pub fn process_group_exists(pgid: u32) -> ProcessResult<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), None) {
        Ok(_) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(e) => Err(ProcessError::check_failed(
            pgid.to_string(),
            format!("Failed to check process group: {}", e),
        )),
    }
}
