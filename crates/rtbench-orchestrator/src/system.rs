//! Probing the machine under test.

use rtbench_worker::SystemResources;
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::System;
use tracing::debug;

const NUMA_NODE_ROOT: &str = "/sys/devices/system/node";

/// Static facts about the host, gathered once before the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: Option<String>,
    pub kernel_version: Option<String>,
    pub num_cpus: usize,
    pub cpu_model: String,
    pub memory_bytes: u64,
    pub numa_nodes: usize,
}

impl SystemInfo {
    pub fn probe() -> Self {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.refresh_memory();

        let mut num_cpus = sys.cpus().len();
        if num_cpus == 0 {
            num_cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
        }
        let cpu_model = sys
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let info = Self {
            hostname: System::host_name(),
            kernel_version: System::kernel_version(),
            num_cpus,
            cpu_model,
            memory_bytes: sys.total_memory(),
            numa_nodes: count_numa_nodes(Path::new(NUMA_NODE_ROOT)),
        };
        debug!(
            cpus = info.num_cpus,
            memory = info.memory_bytes,
            numa = info.numa_nodes,
            "Probed system: {}",
            info.cpu_model
        );
        info
    }

    /// The subset workers size their loads from.
    pub fn resources(&self) -> SystemResources {
        SystemResources {
            num_cpus: self.num_cpus,
            memory_bytes: self.memory_bytes,
            numa_nodes: self.numa_nodes,
            cpu_description: self.cpu_model.clone(),
        }
    }
}

/// Count `node<N>` entries under `root`; 0 when the directory is absent.
pub fn count_numa_nodes(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.strip_prefix("node")
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
        .count()
}

/// Current 1-minute load average.
pub fn load_average() -> f64 {
    System::load_average().one
}

/// Load average samples taken during the run.
#[derive(Debug, Clone, Default)]
pub struct LoadAverageTracker {
    sum: f64,
    count: u32,
}

impl LoadAverageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    pub fn samples(&self) -> u32 {
        self.count
    }

    /// Mean of the recorded samples, `None` before the first one.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}
