//! Worker runtime: the shared lifecycle around a [`LoadProfile`].

use crate::backoff::SpawnBackoff;
use crate::gate::StartSignal;
use crate::profile::LoadProfile;
use crate::sampler::spawn_ingest;
use crate::spec::{LogPaths, WorkerSpec};
use rtbench_common::{BenchError, BenchResult, WorkerName, WorkerRole};
use rtbench_histogram::ChannelSet;
use rtbench_process::{spawn_command, stop_child, ChildOutput, CommandLine};
use rtbench_worker_state::{WorkerState, WorkerStateMachine};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runtime knobs that are not part of the worker's configuration proper.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Minimum time between two spawns of a load that keeps exiting. A
    /// load whose subprocess ran longer than this is respawned at once.
    pub restart_interval: Duration,
    pub spawn_backoff: SpawnBackoff,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            restart_interval: Duration::from_secs(1),
            spawn_backoff: SpawnBackoff::default(),
        }
    }
}

/// Lock-free view of a worker, usable while the worker runs on its task.
#[derive(Debug, Clone)]
pub struct WorkerObserver {
    name: WorkerName,
    role: WorkerRole,
    ready: Arc<AtomicBool>,
    pgid: Arc<AtomicU32>,
    state: watch::Receiver<WorkerState>,
}

impl WorkerObserver {
    pub fn name(&self) -> &WorkerName {
        &self.name
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Process group of the current subprocess, if one is running.
    pub fn pgid(&self) -> Option<u32> {
        match self.pgid.load(Ordering::SeqCst) {
            0 => None,
            pgid => Some(pgid),
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.state().is_terminal()
    }

    /// Wait until the published state satisfies `f`. Returns the last
    /// state seen if the worker goes away first.
    pub async fn wait_for_state(&mut self, f: impl FnMut(&WorkerState) -> bool) -> WorkerState {
        let seen = match self.state.wait_for(f).await {
            Ok(state) => Some(*state),
            Err(_) => None,
        };
        seen.unwrap_or_else(|| *self.state.borrow())
    }
}

/// What a worker leaves behind once its task has finished.
#[derive(Debug)]
pub struct WorkerOutcome {
    pub name: WorkerName,
    pub role: WorkerRole,
    pub final_state: WorkerState,
    /// Command line that was run, `None` if nothing was.
    pub command: Option<String>,
    pub spawns: u32,
    pub restarts: u32,
    /// The subprocess ended without being asked to.
    pub ended_on_its_own: bool,
    pub channels: Option<ChannelSet>,
    pub log_paths: Option<LogPaths>,
}

/// A load generator or the sampler, driven through its lifecycle.
pub struct Worker {
    spec: Arc<WorkerSpec>,
    profile: Box<dyn LoadProfile>,
    options: WorkerOptions,
    state: WorkerStateMachine,
    state_tx: watch::Sender<WorkerState>,
    ready: Arc<AtomicBool>,
    pgid: Arc<AtomicU32>,
    command: Option<CommandLine>,
    channels: Option<ChannelSet>,
    ingest: Option<JoinHandle<ChannelSet>>,
    spawns: u32,
    restarts: u32,
    ended_on_its_own: bool,
}

impl Worker {
    pub fn new(spec: Arc<WorkerSpec>, profile: Box<dyn LoadProfile>) -> Self {
        let state = WorkerStateMachine::new(spec.name.as_str());
        let (state_tx, _) = watch::channel(state.current_state());
        Self {
            spec,
            profile,
            options: WorkerOptions::default(),
            state,
            state_tx,
            ready: Arc::new(AtomicBool::new(false)),
            pgid: Arc::new(AtomicU32::new(0)),
            command: None,
            channels: None,
            ingest: None,
            spawns: 0,
            restarts: 0,
            ended_on_its_own: false,
        }
    }

    pub fn with_options(mut self, options: WorkerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &WorkerName {
        &self.spec.name
    }

    pub fn role(&self) -> WorkerRole {
        self.profile.role()
    }

    pub fn kind(&self) -> &'static str {
        self.profile.kind()
    }

    pub fn observer(&self) -> WorkerObserver {
        WorkerObserver {
            name: self.spec.name.clone(),
            role: self.role(),
            ready: Arc::clone(&self.ready),
            pgid: Arc::clone(&self.pgid),
            state: self.state_tx.subscribe(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> WorkerState {
        self.state.current_state()
    }

    /// The command line run once the start gate opened.
    pub fn describe(&self) -> Option<String> {
        self.command.as_ref().map(CommandLine::describe)
    }

    /// Where the load's stdout/stderr are appended, when logging is on.
    pub fn log_paths(&self) -> Option<LogPaths> {
        match self.role() {
            WorkerRole::ContinuousLoad => self.spec.log_paths(),
            WorkerRole::Sampler => None,
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state.current_state());
    }

    pub async fn setup(&mut self) -> BenchResult<()> {
        self.state.transition_to_setting_up()?;
        self.publish();
        info!(worker = %self.spec.name, kind = self.profile.kind(), "Setting up");
        self.profile.setup(&self.spec).await
    }

    /// Run the one-time build, then mark the worker ready.
    pub async fn build(&mut self) -> BenchResult<()> {
        self.state.transition_to_building()?;
        self.publish();
        self.profile.build(&self.spec).await?;

        self.state.transition_to_awaiting_start()?;
        self.ready.store(true, Ordering::SeqCst);
        self.publish();
        info!(worker = %self.spec.name, "Ready");
        Ok(())
    }

    /// Wait for the start gate, then keep the subprocess running until
    /// `stop` fires (or, for the sampler, until it exits).
    pub async fn run(&mut self, mut start: StartSignal, stop: &CancellationToken) -> BenchResult<()> {
        if !start.wait(stop).await {
            return self.finish("stop requested before start");
        }
        self.state.transition_to_running()?;
        self.publish();

        let Some(command) = self.profile.command(&self.spec) else {
            info!(worker = %self.spec.name, "Nothing to run, idling until stopped");
            stop.cancelled().await;
            return self.finish("stop requested");
        };
        info!(worker = %self.spec.name, "Running '{}'", command);
        self.command = Some(command.clone());

        let output = self.output().await?;
        self.channels = self.profile.channels(&self.spec);

        let mut backoff = self.options.spawn_backoff.clone();
        let mut child: Option<Child> = None;
        loop {
            let spawned_at = Instant::now();
            match self.spawn(&command, &output) {
                Ok(spawned) => {
                    backoff.reset();
                    child = Some(spawned);
                }
                Err(e @ BenchError::TransientResource { .. }) => {
                    let delay = backoff.next_delay();
                    warn!(worker = %self.spec.name, "{}; retrying in {:?}", e, delay);
                    tokio::select! {
                        _ = sleep(delay) => continue,
                        _ = stop.cancelled() => break,
                    }
                }
                Err(e) => return Err(e),
            }

            let exited = match child.as_mut() {
                Some(running) => tokio::select! {
                    res = running.wait() => Some(res),
                    _ = stop.cancelled() => None,
                },
                None => None,
            };
            let Some(status) = exited else {
                break;
            };
            let status = status?;
            child = None;
            self.pgid.store(0, Ordering::SeqCst);

            if !self.role().restarts_on_exit() {
                warn!(worker = %self.spec.name, %status, "Subprocess exited on its own");
                self.ended_on_its_own = true;
                self.collect_channels().await;
                return self.finish("subprocess exited");
            }

            self.restarts += 1;
            debug!(worker = %self.spec.name, %status, restarts = self.restarts, "Load exited, restarting");
            tokio::select! {
                _ = sleep_until(spawned_at + self.options.restart_interval) => {}
                _ = stop.cancelled() => break,
            }
        }

        self.state.transition_to_stopping("stop requested")?;
        self.publish();
        if let Some(mut running) = child {
            let outcome = stop_child(
                self.spec.name.as_str(),
                &mut running,
                self.profile.stop_signal(),
                self.spec.grace_period,
            )
            .await?;
            self.pgid.store(0, Ordering::SeqCst);
            info!(
                worker = %self.spec.name,
                forced = outcome.was_forced(),
                "Subprocess stopped ({})",
                outcome.status()
            );
        }
        self.collect_channels().await;
        self.state.transition_to_stopped()?;
        self.publish();
        Ok(())
    }

    /// Setup, build and run in one go, honoring `stop` at every stage.
    pub async fn execute(mut self, start: StartSignal, stop: CancellationToken) -> BenchResult<WorkerOutcome> {
        match self.drive(start, &stop).await {
            Ok(()) => Ok(self.into_outcome()),
            Err(e) => {
                self.mark_failed(&e);
                Err(e)
            }
        }
    }

    async fn drive(&mut self, start: StartSignal, stop: &CancellationToken) -> BenchResult<()> {
        if stop.is_cancelled() {
            return self.finish("stop requested before setup");
        }

        let setup = tokio::select! {
            res = self.setup() => Some(res),
            _ = stop.cancelled() => None,
        };
        match setup {
            Some(res) => res?,
            None => return self.finish("stop requested during setup"),
        }

        let build = tokio::select! {
            res = self.build() => Some(res),
            _ = stop.cancelled() => None,
        };
        match build {
            Some(res) => res?,
            None => return self.finish("stop requested during build"),
        }

        self.run(start, stop).await
    }

    async fn output(&self) -> BenchResult<ChildOutput> {
        if self.role() == WorkerRole::Sampler {
            return Ok(ChildOutput::PipeStdout);
        }
        let output = self.spec.child_output();
        if let ChildOutput::Append { stdout, .. } = &output {
            if let Some(dir) = stdout.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        Ok(output)
    }

    fn spawn(&mut self, command: &CommandLine, output: &ChildOutput) -> BenchResult<Child> {
        let mut child = spawn_command(self.spec.name.as_str(), command, output)?;
        self.spawns += 1;
        // the child leads its own group, so its pid is the pgid
        self.pgid.store(child.id().unwrap_or(0), Ordering::SeqCst);
        if let Some(channels) = self.channels.take() {
            match child.stdout.take() {
                Some(stdout) => {
                    self.ingest = Some(spawn_ingest(self.spec.name.to_string(), stdout, channels));
                }
                None => self.channels = Some(channels),
            }
        }
        Ok(child)
    }

    async fn collect_channels(&mut self) {
        if let Some(handle) = self.ingest.take() {
            match handle.await {
                Ok(channels) => self.channels = Some(channels),
                Err(e) => error!(worker = %self.spec.name, "Histogram ingest task failed: {}", e),
            }
        }
    }

    fn finish(&mut self, reason: &str) -> BenchResult<()> {
        self.state.transition_to_stopping(reason)?;
        self.publish();
        self.state.transition_to_stopped()?;
        self.publish();
        debug!(worker = %self.spec.name, "Finished: {}", reason);
        Ok(())
    }

    fn mark_failed(&mut self, err: &BenchError) {
        error!(worker = %self.spec.name, "Worker failed: {}", err);
        if !self.state.current_state().is_terminal()
            && self.state.transition_to_failed(err.to_string()).is_ok()
        {
            self.publish();
        }
    }

    fn into_outcome(self) -> WorkerOutcome {
        let log_paths = self.log_paths();
        WorkerOutcome {
            name: self.spec.name.clone(),
            role: self.profile.role(),
            final_state: self.state.current_state(),
            command: self.command.as_ref().map(CommandLine::describe),
            spawns: self.spawns,
            restarts: self.restarts,
            ended_on_its_own: self.ended_on_its_own,
            channels: self.channels,
            log_paths,
        }
    }
}
