//! Drives a set of workers through one benchmark run.
//!
//! The sequence is fixed: [`Orchestrator::start_all`] spawns every worker
//! and holds them at the start gate until all of them are ready,
//! [`Orchestrator::run_for`] opens the gate and watches the workers for the
//! measurement window, [`Orchestrator::stop_all`] tears everything down
//! with bounded waits. [`Orchestrator::run`] chains the three and stops
//! the workers on any failure.

use crate::config::OrchestratorConfig;
use crate::report::{BenchmarkReport, RunMetadata, ShutdownTimeoutRecord, WorkerSummary};
use crate::system::{load_average, LoadAverageTracker};
use chrono::Utc;
use rtbench_common::{BenchError, BenchResult, WorkerRole};
use rtbench_process::{force_kill_group, process_group_exists, FORCE_KILL_TIMEOUT};
use rtbench_worker::{StartGate, Worker, WorkerObserver, WorkerOutcome};
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing knobs of the orchestration loop.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub poll_interval: Duration,
    pub join_timeout: Duration,
    pub sampler_join_timeout: Duration,
    pub load_sample_interval: Duration,
    pub report_interval: Duration,
    pub ready_timeout: Option<Duration>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from(&OrchestratorConfig::default())
    }
}

impl From<&OrchestratorConfig> for OrchestratorOptions {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            join_timeout: config.join_timeout,
            sampler_join_timeout: config.sampler_join_timeout,
            load_sample_interval: config.load_sample_interval,
            report_interval: config.report_interval,
            ready_timeout: config.ready_timeout,
        }
    }
}

enum JoinStatus {
    Joined,
    TimedOut,
}

/// A spawned worker task and what came back from it.
struct WorkerHandle {
    observer: WorkerObserver,
    stop: CancellationToken,
    task: Option<JoinHandle<BenchResult<WorkerOutcome>>>,
    outcome: Option<WorkerOutcome>,
    error: Option<BenchError>,
}

impl WorkerHandle {
    fn name(&self) -> &str {
        self.observer.name().as_str()
    }

    fn is_sampler(&self) -> bool {
        self.observer.role() == WorkerRole::Sampler
    }

    /// The task has ended but its result has not been collected yet.
    fn has_ended(&self) -> bool {
        self.task.as_ref().is_some_and(|task| task.is_finished())
    }

    async fn join(&mut self, limit: Duration) -> JoinStatus {
        let Some(task) = self.task.as_mut() else {
            return JoinStatus::Joined;
        };
        match timeout(limit, task).await {
            Ok(result) => {
                self.task = None;
                self.record(result);
                JoinStatus::Joined
            }
            Err(_) => JoinStatus::TimedOut,
        }
    }

    fn record(&mut self, result: Result<BenchResult<WorkerOutcome>, JoinError>) {
        match result {
            Ok(Ok(outcome)) => self.outcome = Some(outcome),
            Ok(Err(e)) => self.error = Some(e),
            Err(e) => {
                error!(worker = %self.name(), "Worker task failed: {}", e);
                self.error = Some(BenchError::worker_died(self.name(), format!("task failed: {}", e)));
            }
        }
    }

    /// Kill the worker's process group after a join timed out.
    ///
    /// The worker is normally still inside its own stop sequence, so it
    /// reaps the killed child and finishes on its own. Only a task that
    /// stays stuck after that is aborted.
    async fn force_stop(&mut self) {
        let pgid = self.observer.pgid();
        if let Some(pgid) = pgid {
            if let Err(e) = force_kill_group(pgid) {
                warn!(worker = %self.name(), pgid, "{}", e);
            }
        }

        if let JoinStatus::TimedOut = self.join(FORCE_KILL_TIMEOUT).await {
            warn!(worker = %self.name(), "Still running after SIGKILL; aborting");
            self.abort().await;
        }

        if let Some(pgid) = pgid {
            self.confirm_group_gone(pgid).await;
        }
    }

    async fn confirm_group_gone(&self, pgid: u32) {
        let deadline = Instant::now() + FORCE_KILL_TIMEOUT;
        loop {
            match process_group_exists(pgid) {
                Ok(false) => return,
                Ok(true) if Instant::now() < deadline => {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                Ok(true) => {
                    warn!(worker = %self.name(), pgid, "Process group still present after SIGKILL");
                    return;
                }
                Err(e) => {
                    warn!(worker = %self.name(), pgid, "{}", e);
                    return;
                }
            }
        }
    }

    /// Abort the task. Dropping it drops the child, which is killed on drop.
    async fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            if let Err(e) = task.await {
                debug!(worker = %self.name(), "Aborted: {}", e);
            }
        }
    }

    /// Error for a worker whose task ended before the start gate opened.
    fn start_failure(&mut self) -> BenchError {
        match self.error.take() {
            Some(e @ (BenchError::Setup { .. } | BenchError::Build { .. })) => e,
            Some(e) => BenchError::worker_start(self.name(), e.to_string()),
            None => BenchError::worker_start(self.name(), "worker ended before becoming ready"),
        }
    }

    /// Error for a worker whose task ended during the measurement window.
    fn death(&mut self) -> BenchError {
        if let Some(e) = self.error.take() {
            return BenchError::worker_died(self.name(), e.to_string());
        }
        match &self.outcome {
            Some(outcome) if outcome.ended_on_its_own => {
                BenchError::worker_died(self.name(), "subprocess exited on its own")
            }
            _ => BenchError::worker_died(self.name(), "worker task ended"),
        }
    }

    fn summary(&self) -> WorkerSummary {
        match &self.outcome {
            Some(outcome) => WorkerSummary::from(outcome),
            None => WorkerSummary {
                name: self.observer.name().clone(),
                role: self.observer.role(),
                final_state: self.observer.state(),
                command: None,
                spawns: 0,
                restarts: 0,
                log_paths: None,
                error: Some(
                    self.error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "not joined".to_string()),
                ),
            },
        }
    }
}

/// Owns the workers of one run and the start gate they wait at.
pub struct Orchestrator {
    options: OrchestratorOptions,
    gate: StartGate,
    pending: Vec<Worker>,
    handles: Vec<WorkerHandle>,
    load: LoadAverageTracker,
    shutdown_timeouts: Vec<ShutdownTimeoutRecord>,
}

impl Orchestrator {
    pub fn new(options: OrchestratorOptions) -> Self {
        Self {
            options,
            gate: StartGate::new(),
            pending: Vec::new(),
            handles: Vec::new(),
            load: LoadAverageTracker::new(),
            shutdown_timeouts: Vec::new(),
        }
    }

    /// Register a worker. Only workers added before `start_all` take part.
    pub fn add_worker(&mut self, worker: Worker) {
        self.pending.push(worker);
    }

    pub fn worker_count(&self) -> usize {
        self.pending.len() + self.handles.len()
    }

    /// Observers of the started workers.
    pub fn observers(&self) -> Vec<WorkerObserver> {
        self.handles.iter().map(|h| h.observer.clone()).collect()
    }

    pub fn shutdown_timeouts(&self) -> &[ShutdownTimeoutRecord] {
        &self.shutdown_timeouts
    }

    /// Spawn every worker and wait until all of them are ready.
    ///
    /// Returns once every worker has finished setup and build and is parked
    /// at the start gate. A worker that ends first fails the barrier with
    /// its own setup or build error, or a start error naming it.
    pub async fn start_all(&mut self, cancel: &CancellationToken) -> BenchResult<()> {
        let workers = std::mem::take(&mut self.pending);
        info!("Starting {} workers", workers.len());
        for worker in workers {
            let observer = worker.observer();
            let stop = CancellationToken::new();
            debug!(worker = %observer.name(), kind = worker.kind(), "Spawning worker task");
            let task = tokio::spawn(worker.execute(self.gate.signal(), stop.clone()));
            self.handles.push(WorkerHandle {
                observer,
                stop,
                task: Some(task),
                outcome: None,
                error: None,
            });
        }

        let join_timeout = self.options.join_timeout;
        let started = Instant::now();
        let mut poll = interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Interrupted while waiting for workers to become ready");
                    return Err(BenchError::Interrupted);
                }
                _ = poll.tick() => {}
            }

            if let Some(handle) = self.handles.iter_mut().find(|h| h.has_ended()) {
                handle.join(join_timeout).await;
                let err = handle.start_failure();
                error!(worker = %handle.name(), "Worker failed to start: {}", err);
                return Err(err);
            }

            let waiting: Vec<String> = self
                .handles
                .iter()
                .filter(|h| !h.observer.is_ready())
                .map(|h| h.name().to_string())
                .collect();
            if waiting.is_empty() {
                info!("All {} workers ready", self.handles.len());
                return Ok(());
            }
            debug!("Waiting for {} worker(s): {}", waiting.len(), waiting.join(", "));

            if let Some(limit) = self.options.ready_timeout {
                if started.elapsed() >= limit {
                    return Err(BenchError::worker_start(
                        waiting[0].as_str(),
                        format!("not ready after {:?}", limit),
                    ));
                }
            }
        }
    }

    /// Open the start gate and keep the run going for `duration`.
    ///
    /// Cancellation ends the window early and is reported through
    /// [`RunMetadata::interrupted`]; a worker task ending inside the window
    /// is a fatal [`BenchError::WorkerDied`].
    pub async fn run_for(&mut self, duration: Duration, cancel: &CancellationToken) -> BenchResult<RunMetadata> {
        let started_at = Utc::now();
        let start = Instant::now();
        let deadline = start + duration;

        self.gate.open();
        info!("Start gate open, running for {:?}", duration);

        let mut poll = interval(self.options.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut next_load_sample = start + self.options.load_sample_interval;
        let mut next_report = start + self.options.report_interval;
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Run interrupted after {:?}", start.elapsed());
                    interrupted = true;
                    break;
                }
                _ = sleep_until(deadline) => break,
                _ = poll.tick() => {}
            }

            let join_timeout = self.options.join_timeout;
            if let Some(handle) = self.handles.iter_mut().find(|h| h.has_ended()) {
                handle.join(join_timeout).await;
                let err = handle.death();
                error!(worker = %handle.name(), "{}", err);
                return Err(err);
            }

            let now = Instant::now();
            if now >= next_load_sample {
                let load = load_average();
                self.load.record(load);
                debug!(load, "Sampled load average");
                next_load_sample += self.options.load_sample_interval;
            }
            if now >= next_report {
                let remaining = deadline.saturating_duration_since(now);
                info!(
                    "{:?} remaining, average load {:.2}",
                    remaining,
                    self.load.average().unwrap_or(0.0)
                );
                next_report += self.options.report_interval;
            }
        }

        Ok(RunMetadata {
            started_at,
            finished_at: Utc::now(),
            requested: duration,
            elapsed: start.elapsed(),
            interrupted,
            mean_load_average: self.load.average(),
            load_samples: self.load.samples(),
        })
    }

    /// Stop the sampler, then every load, and join them all.
    ///
    /// A worker that outlives its join timeout is recorded and aborted. The
    /// call only fails when the sampler did not hand back its histogram.
    pub async fn stop_all(&mut self) -> BenchResult<()> {
        let (samplers, loads): (Vec<usize>, Vec<usize>) =
            (0..self.handles.len()).partition(|&i| self.handles[i].is_sampler());
        let order: Vec<usize> = samplers.into_iter().chain(loads).collect();

        info!("Stopping {} workers", order.len());
        for &i in &order {
            self.handles[i].stop.cancel();
        }

        let mut flush_error = None;
        for &i in &order {
            let handle = &mut self.handles[i];
            let sampler = handle.is_sampler();
            let limit = if sampler {
                self.options.sampler_join_timeout
            } else {
                self.options.join_timeout
            };

            let timed_out = match handle.join(limit).await {
                JoinStatus::Joined => false,
                JoinStatus::TimedOut => {
                    let err = BenchError::shutdown_timeout(handle.name(), limit);
                    warn!(worker = %handle.name(), "{}; killing its process group", err);
                    self.shutdown_timeouts.push(ShutdownTimeoutRecord {
                        worker: handle.observer.name().clone(),
                        waited: limit,
                    });
                    handle.force_stop().await;
                    true
                }
            };

            if let Some(e) = &handle.error {
                warn!(worker = %handle.name(), "Worker ended with error: {}", e);
            }
            if sampler && flush_error.is_none() {
                flush_error = if timed_out {
                    Some(format!("{} did not exit within {:?}", handle.name(), limit))
                } else if let Some(e) = &handle.error {
                    Some(e.to_string())
                } else if handle.outcome.as_ref().is_some_and(|o| o.channels.is_some()) {
                    None
                } else {
                    Some(format!("{} produced no histogram", handle.name()))
                };
            }
        }

        info!("All workers stopped");
        match flush_error {
            Some(reason) => Err(BenchError::sampler_flush(reason)),
            None => Ok(()),
        }
    }

    /// Reduce the sampler's channels and summarize every worker.
    pub fn report(&self, run: RunMetadata) -> BenchmarkReport {
        let channels = self
            .handles
            .iter()
            .filter(|h| h.is_sampler())
            .find_map(|h| h.outcome.as_ref().and_then(|o| o.channels.as_ref()))
            .map(|set| set.reduce_all())
            .unwrap_or_default();

        BenchmarkReport {
            run,
            system: None,
            report_dir: None,
            workers: self.handles.iter().map(WorkerHandle::summary).collect(),
            channels,
            shutdown_timeouts: self.shutdown_timeouts.clone(),
        }
    }

    /// Start, run for `duration`, stop and reduce.
    pub async fn run(mut self, duration: Duration, cancel: &CancellationToken) -> BenchResult<BenchmarkReport> {
        if let Err(e) = self.start_all(cancel).await {
            self.abandon(&e).await;
            return Err(e);
        }

        let run = match self.run_for(duration, cancel).await {
            Ok(run) => run,
            Err(e) => {
                self.abandon(&e).await;
                return Err(e);
            }
        };

        self.stop_all().await?;
        Ok(self.report(run))
    }

    async fn abandon(&mut self, err: &BenchError) {
        error!("Benchmark failed: {}; stopping all workers", err);
        if let Err(e) = self.stop_all().await {
            warn!("Stop after failure: {}", e);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.stop.cancel();
        }
    }
}
