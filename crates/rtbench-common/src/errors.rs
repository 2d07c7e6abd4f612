//! Error types for rtbench.
//!
//! Two layers of errors exist:
//!
//! - [`ProcessError`] covers the mechanics of a single subprocess (spawn,
//!   signal delivery, exit confirmation, lifecycle state checks).
//! - [`BenchError`] is the benchmark-level taxonomy. Each variant carries
//!   the worker it concerns so a failed run can always be attributed.
//!
//! Fatal variants abort `run_benchmark`; [`BenchError::TransientResource`]
//! is absorbed by a worker's run loop and [`BenchError::ShutdownTimeout`]
//! is only ever logged and recorded.
//!
//! ```
//! use rtbench_common::{BenchError, BenchResult};
//!
//! fn prepare() -> BenchResult<()> {
//!     Err(BenchError::setup("kcompile", "no kernel tarball found"))
//! }
//!
//! let err = prepare().unwrap_err();
//! assert!(err.is_fatal());
//! assert_eq!(err.worker(), Some("kcompile"));
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result alias for benchmark-level operations.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Benchmark-level errors.
#[derive(Debug, Error)]
pub enum BenchError {
    /// A worker could not prepare its inputs.
    #[error("Setup failed for worker '{worker}': {reason}")]
    Setup { worker: String, reason: String },

    /// A worker's one-time build step failed.
    #[error("Build failed for worker '{worker}': {reason}")]
    Build { worker: String, reason: String },

    /// A worker never reached the ready state.
    #[error("Worker '{worker}' failed to start: {reason}")]
    WorkerStart { worker: String, reason: String },

    /// A worker disappeared while the measurement window was open.
    #[error("Worker '{worker}' died during the run: {reason}")]
    WorkerDied { worker: String, reason: String },

    /// A recoverable resource shortage, e.g. ENOMEM while spawning.
    #[error("Transient resource error in worker '{worker}': {reason}")]
    TransientResource { worker: String, reason: String },

    /// A worker did not stop within its grace window.
    #[error("Worker '{worker}' did not stop within {waited:?}")]
    ShutdownTimeout { worker: String, waited: Duration },

    /// The sampler never delivered its final histogram.
    #[error("Sampler did not flush its histogram: {reason}")]
    SamplerFlush { reason: String },

    /// The run was cancelled before the measurement window opened.
    #[error("Benchmark interrupted")]
    Interrupted,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Low-level process failure.
    #[error(transparent)]
    Process(#[from] ProcessError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    pub fn setup(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Setup {
            worker: worker.into(),
            reason: reason.into(),
        }
    }

    pub fn build(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Build {
            worker: worker.into(),
            reason: reason.into(),
        }
    }

    pub fn worker_start(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerStart {
            worker: worker.into(),
            reason: reason.into(),
        }
    }

    pub fn worker_died(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::WorkerDied {
            worker: worker.into(),
            reason: reason.into(),
        }
    }

    pub fn transient(worker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransientResource {
            worker: worker.into(),
            reason: reason.into(),
        }
    }

    pub fn shutdown_timeout(worker: impl Into<String>, waited: Duration) -> Self {
        Self::ShutdownTimeout {
            worker: worker.into(),
            waited,
        }
    }

    pub fn sampler_flush(reason: impl Into<String>) -> Self {
        Self::SamplerFlush {
            reason: reason.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error aborts a benchmark run.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::TransientResource { .. } | Self::ShutdownTimeout { .. }
        )
    }

    /// The worker this error is attributed to, if any.
    pub fn worker(&self) -> Option<&str> {
        match self {
            Self::Setup { worker, .. }
            | Self::Build { worker, .. }
            | Self::WorkerStart { worker, .. }
            | Self::WorkerDied { worker, .. }
            | Self::TransientResource { worker, .. }
            | Self::ShutdownTimeout { worker, .. } => Some(worker),
            Self::Process(e) => Some(e.id()),
            _ => None,
        }
    }
}

// ==============================================================================
// Process Errors
// ==============================================================================

/// Errors raised while driving a single subprocess.
#[derive(Error, Debug, Clone)]
pub enum ProcessError {
    #[error("Process spawn failed: {id} - {reason}")]
    SpawnFailed { id: String, reason: String },

    #[error("Process signal failed: {id} - {reason}")]
    SignalFailed { id: String, reason: String },

    #[error("Process stop failed: {id} - {reason}")]
    StopFailed { id: String, reason: String },

    #[error("Process timeout: {id} - {operation}")]
    Timeout { id: String, operation: String },

    #[error("Process state error: {id} - expected {expected}, got {actual}")]
    InvalidState {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("Process check failed: {id} - {reason}")]
    CheckFailed { id: String, reason: String },
}

impl ProcessError {
    pub fn spawn_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn signal_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SignalFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Timeout {
            id: id.into(),
            operation: operation.into(),
        }
    }

    pub fn invalid_state(
        id: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            id: id.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn check_failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CheckFailed {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Identifier of the process (worker name or pid) the error refers to.
    pub fn id(&self) -> &str {
        match self {
            Self::SpawnFailed { id, .. }
            | Self::SignalFailed { id, .. }
            | Self::StopFailed { id, .. }
            | Self::Timeout { id, .. }
            | Self::InvalidState { id, .. }
            | Self::CheckFailed { id, .. } => id,
        }
    }
}

/// Result type for process operations.
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
