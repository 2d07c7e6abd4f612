//! Benchmark configuration, loaded from YAML.
//!
//! Every section is optional; an empty document yields the default run
//! (60 seconds of hackbench and kcompile under cyclictest).

use anyhow::{Context, Result};
use rtbench_process::StopSignal;
use rtbench_worker::SamplerTunables;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default = "default_loads")]
    pub loads: Vec<LoadConfig>,
}

/// What to run and where.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_duration", with = "duration_serde")]
    pub duration: Duration,
    #[serde(default = "default_workdir")]
    pub workdir: PathBuf,
    #[serde(default = "default_srcdir")]
    pub srcdir: PathBuf,
    #[serde(default)]
    pub logging: bool,
    #[serde(default)]
    pub only_load: bool,
    /// How long a worker's subprocess gets to exit after its stop signal.
    /// Together with the force-kill wait it must fit in the join timeouts.
    #[serde(default = "default_grace_period", with = "duration_serde")]
    pub grace_period: Duration,
}

/// Timing of the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,
    #[serde(default = "default_join_timeout", with = "duration_serde")]
    pub join_timeout: Duration,
    #[serde(default = "default_sampler_join_timeout", with = "duration_serde")]
    pub sampler_join_timeout: Duration,
    #[serde(default = "default_load_sample_interval", with = "duration_serde")]
    pub load_sample_interval: Duration,
    #[serde(default = "default_report_interval", with = "duration_serde")]
    pub report_interval: Duration,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "option_duration_serde"
    )]
    pub ready_timeout: Option<Duration>,
    #[serde(default = "default_restart_interval", with = "duration_serde")]
    pub restart_interval: Duration,
}

/// Latency sampler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_sampler_executable")]
    pub executable: String,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub distance: u32,
    #[serde(default = "default_buckets")]
    pub buckets: u32,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    Hackbench,
    Kcompile,
    Command,
}

/// One load generator. Fields that do not apply to `kind` are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub name: String,
    pub kind: LoadKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs_per_core: Option<u32>,
    /// hackbench `-l`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loops: Option<u32>,
    /// hackbench `-s`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datasize: Option<u32>,
    /// kcompile tarball name inside `srcdir`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_signal: Option<StopSignal>,
}

impl LoadConfig {
    pub fn new(name: impl Into<String>, kind: LoadKind) -> Self {
        Self {
            name: name.into(),
            kind,
            jobs_per_core: None,
            loops: None,
            datasize: None,
            tarball: None,
            executable: None,
            args: Vec::new(),
            stop_signal: None,
        }
    }
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub duration: Option<Duration>,
    pub workdir: Option<PathBuf>,
    pub srcdir: Option<PathBuf>,
    pub logging: bool,
    pub only_load: bool,
    pub sampler_interval: Option<u32>,
    pub sampler_distance: Option<u32>,
    pub sampler_buckets: Option<u32>,
    pub sampler_priority: Option<u32>,
    pub hackbench_jobs_per_core: Option<u32>,
    pub kcompile_jobs_per_core: Option<u32>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            run: RunConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            sampler: SamplerConfig::default(),
            loads: default_loads(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration: default_duration(),
            workdir: default_workdir(),
            srcdir: default_srcdir(),
            logging: false,
            only_load: false,
            grace_period: default_grace_period(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            join_timeout: default_join_timeout(),
            sampler_join_timeout: default_sampler_join_timeout(),
            load_sample_interval: default_load_sample_interval(),
            report_interval: default_report_interval(),
            ready_timeout: None,
            restart_interval: default_restart_interval(),
        }
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            executable: default_sampler_executable(),
            interval: default_interval(),
            distance: 0,
            buckets: default_buckets(),
            priority: default_priority(),
            threads: None,
        }
    }
}

impl SamplerConfig {
    pub fn tunables(&self) -> SamplerTunables {
        SamplerTunables {
            interval: self.interval,
            distance: self.distance,
            buckets: self.buckets,
            priority: self.priority,
            threads: self.threads,
        }
    }
}

impl BenchConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: BenchConfig = if content.trim().is_empty() {
            BenchConfig::default()
        } else {
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Apply command-line overrides, then re-validate.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(duration) = overrides.duration {
            self.run.duration = duration;
        }
        if let Some(workdir) = &overrides.workdir {
            self.run.workdir = workdir.clone();
        }
        if let Some(srcdir) = &overrides.srcdir {
            self.run.srcdir = srcdir.clone();
        }
        self.run.logging |= overrides.logging;
        self.run.only_load |= overrides.only_load;

        if let Some(v) = overrides.sampler_interval {
            self.sampler.interval = v;
        }
        if let Some(v) = overrides.sampler_distance {
            self.sampler.distance = v;
        }
        if let Some(v) = overrides.sampler_buckets {
            self.sampler.buckets = v;
        }
        if let Some(v) = overrides.sampler_priority {
            self.sampler.priority = v;
        }

        for load in &mut self.loads {
            let jobs = match load.kind {
                LoadKind::Hackbench => overrides.hackbench_jobs_per_core,
                LoadKind::Kcompile => overrides.kcompile_jobs_per_core,
                LoadKind::Command => None,
            };
            if jobs.is_some() {
                load.jobs_per_core = jobs;
            }
        }

        self.validate()
    }
}

// Default value functions
fn default_duration() -> Duration {
    Duration::from_secs(60)
}

fn default_workdir() -> PathBuf {
    PathBuf::from(".")
}

fn default_srcdir() -> PathBuf {
    PathBuf::from("/usr/share/rtbench/loadsource")
}

fn default_grace_period() -> Duration {
    Duration::from_secs(2)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_join_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_sampler_join_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_load_sample_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_report_interval() -> Duration {
    Duration::from_secs(600)
}

fn default_restart_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_sampler_executable() -> String {
    "cyclictest".to_string()
}

fn default_interval() -> u32 {
    100
}

fn default_buckets() -> u32 {
    2000
}

fn default_priority() -> u32 {
    95
}

fn default_loads() -> Vec<LoadConfig> {
    vec![
        LoadConfig::new("hackbench", LoadKind::Hackbench),
        LoadConfig::new("kcompile", LoadKind::Kcompile),
    ]
}

/// Parse `"90"`, `"250ms"`, `"30s"`, `"5m"`, `"2h"` or `"1d"`. A bare
/// number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let invalid = || format!("Invalid duration: {}", s);
    // "ms" before "s" since "ms" ends with 's'
    let (num_str, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 86_400_000)
    } else {
        (s, 1_000)
    };
    let value: u64 = num_str.trim().parse().map_err(|_| invalid())?;
    value
        .checked_mul(unit_ms)
        .map(Duration::from_millis)
        .ok_or_else(invalid)
}

fn format_duration(duration: &Duration) -> String {
    if duration.subsec_millis() != 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}s", duration.as_secs())
    }
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(s) => super::parse_duration(&s).map_err(serde::de::Error::custom),
        }
    }
}

// Custom serialization for Option<Duration>
mod option_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_str(&super::format_duration(d)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::duration_serde")] Duration);

        let opt: Option<Wrapper> = Option::deserialize(deserializer)?;
        Ok(opt.map(|Wrapper(d)| d))
    }
}
