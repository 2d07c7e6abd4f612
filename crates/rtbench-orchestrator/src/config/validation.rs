use super::*;
use anyhow::{anyhow, Result};
use rtbench_process::FORCE_KILL_TIMEOUT;
use std::collections::HashSet;

/// Largest bucket count the sampler may be asked for.
pub const MAX_BUCKETS: u32 = 100_000;

/// Worker name used for the latency sampler.
pub const SAMPLER_NAME: &str = "cyclictest";

/// Validate the complete configuration
pub fn validate_config(config: &BenchConfig) -> Result<()> {
    validate_run_config(&config.run)?;
    validate_orchestrator_config(&config.orchestrator, config.run.grace_period)?;
    validate_sampler_config(&config.sampler)?;
    validate_load_configs(&config.loads)?;

    if config.run.only_load && config.loads.is_empty() {
        return Err(anyhow!("only_load requires at least one load"));
    }

    Ok(())
}

fn validate_run_config(run: &RunConfig) -> Result<()> {
    if run.duration.is_zero() {
        return Err(anyhow!("Run duration must be greater than 0"));
    }

    if run.workdir.as_os_str().is_empty() {
        return Err(anyhow!("Work directory cannot be empty"));
    }

    Ok(())
}

fn validate_orchestrator_config(options: &OrchestratorConfig, grace_period: Duration) -> Result<()> {
    if options.poll_interval.is_zero() {
        return Err(anyhow!("Poll interval must be greater than 0"));
    }

    // a worker's own stop sequence must finish before its join gives up
    let stop_sequence = grace_period + FORCE_KILL_TIMEOUT;
    if options.join_timeout < stop_sequence {
        return Err(anyhow!(
            "Join timeout ({:?}) must cover the grace period plus the force-kill wait ({:?})",
            options.join_timeout,
            stop_sequence
        ));
    }
    if options.sampler_join_timeout < stop_sequence {
        return Err(anyhow!(
            "Sampler join timeout ({:?}) must cover the grace period plus the force-kill wait ({:?})",
            options.sampler_join_timeout,
            stop_sequence
        ));
    }

    if options.load_sample_interval.is_zero() {
        return Err(anyhow!("Load sample interval must be greater than 0"));
    }

    if options.report_interval.is_zero() {
        return Err(anyhow!("Report interval must be greater than 0"));
    }

    if let Some(timeout) = options.ready_timeout {
        if timeout.is_zero() {
            return Err(anyhow!("Ready timeout must be greater than 0 when set"));
        }
    }

    Ok(())
}

fn validate_sampler_config(sampler: &SamplerConfig) -> Result<()> {
    if sampler.executable.is_empty() {
        return Err(anyhow!("Sampler executable cannot be empty"));
    }

    if sampler.interval == 0 {
        return Err(anyhow!("Sampler interval must be greater than 0"));
    }

    if sampler.buckets == 0 || sampler.buckets > MAX_BUCKETS {
        return Err(anyhow!(
            "Sampler buckets must be between 1 and {}, got: {}",
            MAX_BUCKETS,
            sampler.buckets
        ));
    }

    if sampler.priority > 99 {
        return Err(anyhow!(
            "Sampler priority must be between 0 and 99, got: {}",
            sampler.priority
        ));
    }

    if sampler.threads == Some(0) {
        return Err(anyhow!("Sampler threads must be greater than 0 when set"));
    }

    Ok(())
}

fn validate_load_configs(loads: &[LoadConfig]) -> Result<()> {
    // Check for duplicate names
    let mut names = HashSet::new();
    for load in loads {
        if !names.insert(&load.name) {
            return Err(anyhow!("Duplicate load name: {}", load.name));
        }

        validate_load_config(load)?;
    }

    Ok(())
}

fn validate_load_config(load: &LoadConfig) -> Result<()> {
    if load.name.is_empty() {
        return Err(anyhow!("Load name cannot be empty"));
    }

    if load.name.len() > 64 {
        return Err(anyhow!("Load name too long (max 64 characters): {}", load.name));
    }

    // Names become log file stems
    if !load
        .name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(anyhow!(
            "Load name can only contain alphanumeric characters, hyphens, and underscores: {}",
            load.name
        ));
    }

    if load.name == SAMPLER_NAME {
        return Err(anyhow!("Load name '{}' is reserved for the sampler", load.name));
    }

    if load.jobs_per_core == Some(0) {
        return Err(anyhow!("jobs_per_core must be greater than 0 for load: {}", load.name));
    }

    match load.kind {
        LoadKind::Command => {
            let has_executable = load.executable.as_deref().is_some_and(|e| !e.is_empty());
            if !has_executable {
                return Err(anyhow!(
                    "executable is required for command load: {}",
                    load.name
                ));
            }
        }
        LoadKind::Hackbench => {
            if load.loops == Some(0) || load.datasize == Some(0) {
                return Err(anyhow!(
                    "hackbench loops and datasize must be greater than 0: {}",
                    load.name
                ));
            }
        }
        LoadKind::Kcompile => {
            if let Some(tarball) = &load.tarball {
                if tarball.is_empty() || tarball.contains('/') {
                    return Err(anyhow!(
                        "kcompile tarball must be a plain file name: {}",
                        load.name
                    ));
                }
            }
        }
    }

    Ok(())
}
