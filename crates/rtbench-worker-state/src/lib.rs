use chrono::{DateTime, Utc};
use rtbench_common::{ProcessError, ProcessResult};
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_HISTORY: usize = 100;

/// Lifecycle of a benchmark worker.
///
/// ```text
/// Created -> SettingUp -> Building -> AwaitingStart -> Running -> Stopping -> Stopped
/// ```
///
/// Any pre-run state may jump straight to `Stopping` when a stop arrives
/// before the start gate opens, and any non-terminal state may fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Constructed, nothing done yet
    Created,
    /// Preparing inputs (locating tarballs, sizing jobs)
    SettingUp,
    /// One-time build step
    Building,
    /// Ready and parked at the start gate
    AwaitingStart,
    /// Subprocess running (or idling for a profile with nothing to run)
    Running,
    /// Terminating the subprocess
    Stopping,
    /// Done, subprocess reaped
    Stopped,
    /// Ended with an error
    Failed,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::SettingUp => "setting_up",
            WorkerState::Building => "building",
            WorkerState::AwaitingStart => "awaiting_start",
            WorkerState::Running => "running",
            WorkerState::Stopping => "stopping",
            WorkerState::Stopped => "stopped",
            WorkerState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }

    /// States in which the worker has not yet been released by the start gate.
    pub fn is_pre_run(&self) -> bool {
        matches!(
            self,
            WorkerState::Created
                | WorkerState::SettingUp
                | WorkerState::Building
                | WorkerState::AwaitingStart
        )
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, WorkerState::AwaitingStart | WorkerState::Running)
    }
}

/// A recorded state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: WorkerState,
    pub to_state: WorkerState,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
}

/// Validated worker state machine with bounded transition history.
#[derive(Debug, Clone)]
pub struct WorkerStateMachine {
    worker: String,
    current_state: WorkerState,
    previous_state: Option<WorkerState>,
    state_history: Vec<StateTransition>,
    last_transition_time: DateTime<Utc>,
}

impl WorkerStateMachine {
    pub fn new(worker: &str) -> Self {
        Self {
            worker: worker.to_string(),
            current_state: WorkerState::Created,
            previous_state: None,
            state_history: Vec::new(),
            last_transition_time: Utc::now(),
        }
    }

    pub fn current_state(&self) -> WorkerState {
        self.current_state
    }

    pub fn previous_state(&self) -> Option<WorkerState> {
        self.previous_state
    }

    pub fn state_history(&self) -> &[StateTransition] {
        &self.state_history
    }

    pub fn last_transition_time(&self) -> DateTime<Utc> {
        self.last_transition_time
    }

    pub fn is_valid_transition(&self, target: WorkerState) -> bool {
        use WorkerState::*;

        match (self.current_state, target) {
            (Created, SettingUp) => true,
            (SettingUp, Building) => true,
            (Building, AwaitingStart) => true,
            (AwaitingStart, Running) => true,
            (Running, Stopping) => true,
            (Stopping, Stopped) => true,

            // stop requested before the start gate opened
            (from, Stopping) if from.is_pre_run() => true,

            (from, Failed) if !from.is_terminal() => true,

            _ => false,
        }
    }

    pub fn transition_to(&mut self, target: WorkerState, reason: Option<String>) -> ProcessResult<()> {
        if !self.is_valid_transition(target) {
            return Err(ProcessError::invalid_state(
                &self.worker,
                format!("transition to {}", target),
                self.current_state.to_string(),
            ));
        }

        let now = Utc::now();
        let from = self.current_state;
        self.state_history.push(StateTransition {
            from_state: from,
            to_state: target,
            timestamp: now,
            reason,
        });
        if self.state_history.len() > MAX_HISTORY {
            self.state_history.remove(0);
        }

        self.previous_state = Some(from);
        self.current_state = target;
        self.last_transition_time = now;

        tracing::debug!(worker = %self.worker, "Worker transitioned from {} to {}", from, target);
        Ok(())
    }

    pub fn transition_to_setting_up(&mut self) -> ProcessResult<()> {
        self.transition_to(WorkerState::SettingUp, Some("Setup started".to_string()))
    }

    pub fn transition_to_building(&mut self) -> ProcessResult<()> {
        self.transition_to(WorkerState::Building, Some("Build started".to_string()))
    }

    pub fn transition_to_awaiting_start(&mut self) -> ProcessResult<()> {
        self.transition_to(WorkerState::AwaitingStart, Some("Ready".to_string()))
    }

    pub fn transition_to_running(&mut self) -> ProcessResult<()> {
        self.transition_to(WorkerState::Running, Some("Start gate opened".to_string()))
    }

    pub fn transition_to_stopping(&mut self, reason: impl Into<String>) -> ProcessResult<()> {
        self.transition_to(WorkerState::Stopping, Some(reason.into()))
    }

    pub fn transition_to_stopped(&mut self) -> ProcessResult<()> {
        self.transition_to(WorkerState::Stopped, Some("Stopped".to_string()))
    }

    pub fn transition_to_failed(&mut self, reason: impl Into<String>) -> ProcessResult<()> {
        self.transition_to(WorkerState::Failed, Some(reason.into()))
    }

    pub fn time_in_current_state(&self) -> chrono::Duration {
        Utc::now() - self.last_transition_time
    }

    pub fn last_transition(&self) -> Option<&StateTransition> {
        self.state_history.last()
    }

    pub fn count_transitions_to(&self, state: WorkerState) -> usize {
        self.state_history
            .iter()
            .filter(|t| t.to_state == state)
            .count()
    }
}
