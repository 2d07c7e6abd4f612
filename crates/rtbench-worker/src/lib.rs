//! # rtbench worker
//!
//! A worker owns one load generator or the latency sampler. It prepares
//! its inputs, parks at the start gate once ready, then keeps its
//! subprocess running until told to stop.
//!
//! The load-specific parts (what to prepare, what to run, how to stop it)
//! live behind the [`LoadProfile`] trait; [`Worker`] supplies the shared
//! lifecycle: state tracking, the ready flag, restarts, spawn backoff and
//! bounded termination.

pub mod backoff;
pub mod gate;
pub mod profile;
pub mod profiles;
pub mod sampler;
pub mod spec;
pub mod worker;

pub use backoff::SpawnBackoff;
pub use gate::{StartGate, StartSignal};
pub use profile::LoadProfile;
pub use profiles::{CommandProfile, CyclictestProfile, HackbenchProfile, KcompileProfile};
pub use spec::{LogPaths, SamplerTunables, SystemResources, WorkerSpec};
pub use worker::{Worker, WorkerObserver, WorkerOptions, WorkerOutcome};
