//! # rtbench process
//!
//! Low-level process operations used by rtbench workers:
//! - process existence checks
//! - signal delivery to a worker's process group
//! - bounded graceful-then-forced termination with reaping
//! - command construction and spawn-error classification
//!
//! Workers always spawn their subprocess as the leader of a new process
//! group, so every signal here targets the whole group (a `make -j` or a
//! `hackbench` fan-out dies together with its parent).

pub mod check;
pub mod command;
pub mod signal;
pub mod terminate;
pub mod validation;

pub use check::*;
pub use command::*;
pub use signal::*;
pub use terminate::*;
pub use validation::*;
