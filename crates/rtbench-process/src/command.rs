//! Command construction and spawning for worker subprocesses.

use nix::errno::Errno;
use rtbench_common::{BenchError, BenchResult, ProcessError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Space-joined form used in logs and run metadata.
    pub fn describe(&self) -> String {
        let mut out = self.program.clone();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildOutput {
    /// Both streams discarded.
    Discard,
    /// Stdout piped back to the caller; stderr discarded.
    PipeStdout,
    /// Both streams appended to the given files.
    Append { stdout: PathBuf, stderr: PathBuf },
}

/// Whether a spawn failure is a temporary resource shortage worth retrying.
pub fn is_transient_spawn_error(err: &io::Error) -> bool {
    err.raw_os_error() == Some(Errno::ENOMEM as i32)
}

/// Map a spawn failure onto the benchmark error taxonomy.
pub fn classify_spawn_error(worker: &str, err: io::Error) -> BenchError {
    if is_transient_spawn_error(&err) {
        BenchError::transient(worker, format!("spawn failed: {}", err))
    } else {
        ProcessError::spawn_failed(worker, err.to_string()).into()
    }
}

/// Spawn `cmd` as the leader of a new process group.
///
/// The leader is killed if its handle is dropped. That does not reach the
/// rest of its group; callers that give up on a child kill the group first.
pub fn spawn_command(worker: &str, cmd: &CommandLine, output: &ChildOutput) -> BenchResult<Child> {
    let mut command = Command::new(&cmd.program);
    command
        .args(&cmd.args)
        .stdin(Stdio::null())
        .process_group(0)
        .kill_on_drop(true);

    if let Some(dir) = &cmd.working_dir {
        command.current_dir(dir);
    }

    match output {
        ChildOutput::Discard => {
            command.stdout(Stdio::null()).stderr(Stdio::null());
        }
        ChildOutput::PipeStdout => {
            command.stdout(Stdio::piped()).stderr(Stdio::null());
        }
        ChildOutput::Append { stdout, stderr } => {
            let out = OpenOptions::new().create(true).append(true).open(stdout)?;
            let err = OpenOptions::new().create(true).append(true).open(stderr)?;
            command.stdout(Stdio::from(out)).stderr(Stdio::from(err));
        }
    }

    let child = command
        .spawn()
        .map_err(|e| classify_spawn_error(worker, e))?;
    debug!(worker, pid = child.id(), "Spawned '{}'", cmd);
    Ok(child)
}
