//! # rtbench common
//!
//! Types shared by every rtbench crate: the benchmark error taxonomy, the
//! low-level process error, and the identifiers used to name workers.

pub mod errors;
pub mod types;

pub use errors::{BenchError, BenchResult, ProcessError, ProcessResult};
pub use types::{ChannelId, WorkerName, WorkerRole};
