//! Core identifiers shared across rtbench.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of a worker, unique within one benchmark run.
///
/// ```
/// use rtbench_common::WorkerName;
///
/// let name = WorkerName::from("hackbench");
/// assert_eq!(name.as_str(), "hackbench");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerName(String);

impl WorkerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for WorkerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a worker does with its subprocess.
///
/// A continuous load is a background stressor: when its subprocess exits
/// on its own the worker starts it again. The sampler is the latency
/// measurement tool: it runs once and its exit ends the worker's run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerRole {
    ContinuousLoad,
    Sampler,
}

impl WorkerRole {
    pub fn restarts_on_exit(&self) -> bool {
        matches!(self, WorkerRole::ContinuousLoad)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::ContinuousLoad => "load",
            WorkerRole::Sampler => "sampler",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identifies one latency stream: a CPU core or the `system` aggregate.
///
/// Ordering puts `System` first and cores in ascending order, which is the
/// order channels are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelId {
    System,
    Core(usize),
}

impl ChannelId {
    pub fn is_system(&self) -> bool {
        matches!(self, ChannelId::System)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChannelId::System => "system",
            ChannelId::Core(_) => "core",
        }
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelId::System => write!(f, "system"),
            ChannelId::Core(n) => write!(f, "core {}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_name_conversions() {
        let name = WorkerName::new("kcompile");
        assert_eq!(name.as_str(), "kcompile");
        assert_eq!(name, WorkerName::from("kcompile".to_string()));
        assert_eq!(format!("{}", name), "kcompile");
    }

    #[test]
    fn test_role_restart_policy() {
        assert!(WorkerRole::ContinuousLoad.restarts_on_exit());
        assert!(!WorkerRole::Sampler.restarts_on_exit());
    }

    #[test]
    fn test_channel_ordering_and_display() {
        let mut ids = vec![ChannelId::Core(2), ChannelId::System, ChannelId::Core(0)];
        ids.sort();
        assert_eq!(ids, vec![ChannelId::System, ChannelId::Core(0), ChannelId::Core(2)]);
        assert_eq!(ChannelId::Core(3).to_string(), "core 3");
        assert_eq!(ChannelId::System.to_string(), "system");
        assert_eq!(ChannelId::Core(1).kind(), "core");
    }
}
