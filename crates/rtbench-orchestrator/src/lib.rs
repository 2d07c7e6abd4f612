//! # rtbench orchestrator
//!
//! Runs a set of load workers and the latency sampler as one benchmark:
//! all workers prepare in parallel, are released together once every one
//! of them is ready, run for a fixed window and are then stopped in a
//! fixed order (sampler first). The sampler's histogram is reduced into a
//! [`BenchmarkReport`].
//!
//! Configuration is read from YAML ([`BenchConfig`]); the host is probed
//! with [`SystemInfo::probe`].

pub mod benchmark;
pub mod config;
pub mod orchestrator;
pub mod report;
pub mod system;

pub use benchmark::{build_workers, run_benchmark, BUILD_DIR_NAME};
pub use config::{BenchConfig, LoadConfig, LoadKind, Overrides};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
pub use report::{make_report_dir, BenchmarkReport, RunMetadata, ShutdownTimeoutRecord, WorkerSummary};
pub use system::{load_average, SystemInfo};
