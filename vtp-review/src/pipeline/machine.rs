//! Pipeline stage state machine
//!
//! Stages run in a fixed order: extract, sanitize, transcribe, build-dataset,
//! synthesize. Allowed transitions:
//!
//! ```text
//! blocked -> ready -> running -> done
//!                        |
//!                        +-> error -> running (retry)
//! ```
//!
//! A stage leaves `blocked` only when its predecessor reaches `done`, so an
//! errored stage keeps everything downstream blocked.

use crate::error::{ReviewError, Result};
use crate::models::Job;
use crate::pipeline::events::{StageEvent, StageResult};
use crate::pipeline::stage::{StageState, MAX_LOG_LINES};
use crate::pipeline::stream::parse_progress;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use vtp_common::events::{EventBus, StageId, StageStatus, VtpEvent};

/// Message recorded on a canceled stage
pub const CANCELED_MESSAGE: &str = "canceled by user";

/// Log line appended on cancellation
pub const CANCEL_LOG_LINE: &str = "[cancel] user requested stop";

/// Record of one status change
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub stage: StageId,
    pub old_status: StageStatus,
    pub new_status: StageStatus,
    pub transitioned_at: DateTime<Utc>,
}

/// Whether a stage was terminated by the event just applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// Still running
    Continue,
    Completed { output_path: Option<String> },
    Failed { message: String },
}

fn is_allowed(from: StageStatus, to: StageStatus) -> bool {
    use StageStatus::*;
    matches!(
        (from, to),
        (Blocked, Ready) | (Ready, Running) | (Running, Done) | (Running, Error) | (Error, Running)
    )
}

pub struct PipelineStateMachine {
    stages: Vec<StageState>,
    events: Option<EventBus>,
}

impl Default for PipelineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStateMachine {
    /// Extract ready, everything else blocked
    pub fn new() -> Self {
        Self {
            stages: Self::initial_stages(),
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    fn initial_stages() -> Vec<StageState> {
        StageId::ALL
            .into_iter()
            .map(|stage| {
                let status = if stage.previous().is_none() {
                    StageStatus::Ready
                } else {
                    StageStatus::Blocked
                };
                StageState::new(stage, status)
            })
            .collect()
    }

    pub fn stage(&self, stage: StageId) -> &StageState {
        &self.stages[stage.position()]
    }

    fn stage_mut(&mut self, stage: StageId) -> &mut StageState {
        &mut self.stages[stage.position()]
    }

    pub fn stages(&self) -> &[StageState] {
        &self.stages
    }

    pub fn status(&self, stage: StageId) -> StageStatus {
        self.stage(stage).status
    }

    /// Review is reachable once sanitize is done
    pub fn is_review_unlocked(&self) -> bool {
        self.status(StageId::Sanitize) == StageStatus::Done
    }

    /// Stage currently running, if any
    pub fn running_stage(&self) -> Option<StageId> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Running)
            .map(|s| s.stage)
    }

    /// Overall completion, 0..=100
    ///
    /// Mean over all stages of each stage's completion fraction.
    pub fn overall_progress(&self) -> u8 {
        let sum: f64 = self.stages.iter().map(StageState::completion_fraction).sum();
        let mean = sum / self.stages.len() as f64;
        (mean * 100.0).round().min(100.0) as u8
    }

    fn transition(&mut self, stage: StageId, to: StageStatus, message: Option<String>) -> Result<StateTransition> {
        let from = self.status(stage);
        if !is_allowed(from, to) {
            return Err(ReviewError::InvalidTransition { stage, from, to });
        }

        let state = self.stage_mut(stage);
        state.status = to;
        state.message = message.clone();

        let transition = StateTransition {
            stage,
            old_status: from,
            new_status: to,
            transitioned_at: Utc::now(),
        };
        debug!(%stage, %from, %to, "Stage transition");
        self.emit(VtpEvent::StageStatusChanged {
            stage,
            old_status: from,
            new_status: to,
            message,
            timestamp: transition.transitioned_at,
        });
        Ok(transition)
    }

    /// Start (or retry) a stage
    ///
    /// Allowed from `ready` or `error`. Clears the previous run's log,
    /// progress, message and output.
    pub fn begin(&mut self, stage: StageId) -> Result<StateTransition> {
        let transition = self.transition(stage, StageStatus::Running, None)?;
        let state = self.stage_mut(stage);
        let started_at = transition.transitioned_at;
        state.clear_run();
        state.started_at = Some(started_at);
        info!(%stage, "Stage started");
        Ok(transition)
    }

    /// Append a log line to a running stage, updating progress from any `NN%`
    pub fn append_log(&mut self, stage: StageId, line: &str) -> Result<()> {
        self.require_running(stage)?;
        self.stage_mut(stage).append_log(line);
        self.emit(VtpEvent::StageLog {
            stage,
            line: line.to_string(),
            timestamp: Utc::now(),
        });
        if let Some(percent) = parse_progress(line) {
            self.set_progress(stage, percent)?;
        }
        Ok(())
    }

    /// Set the progress override of a running stage (clamped to 100)
    pub fn set_progress(&mut self, stage: StageId, percent: u8) -> Result<()> {
        self.require_running(stage)?;
        let percent = percent.min(100);
        let state = self.stage_mut(stage);
        if state.progress == Some(percent) {
            return Ok(());
        }
        state.progress = Some(percent);
        self.emit(VtpEvent::StageProgress {
            stage,
            percent,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Mark a running stage done and unlock its successor
    ///
    /// The result's log is kept only when nothing was streamed; a streamed
    /// run already holds those lines.
    pub fn complete(&mut self, stage: StageId, result: &StageResult) -> Result<StateTransition> {
        let transition = self.transition(stage, StageStatus::Done, None)?;
        {
            let state = self.stage_mut(stage);
            if state.log_len() == 0 {
                state.extend_log(result.log.iter().cloned());
            }
            state.output_path = result.output_path.clone();
            state.progress = Some(100);
            state.finished_at = Some(transition.transitioned_at);
        }
        info!(%stage, output = ?result.output_path, "Stage done");

        if let Some(next) = stage.next() {
            if self.status(next) == StageStatus::Blocked {
                self.transition(next, StageStatus::Ready, None)?;
            }
        }
        Ok(transition)
    }

    /// Mark a running stage failed; downstream stays blocked
    pub fn fail(&mut self, stage: StageId, message: impl Into<String>) -> Result<StateTransition> {
        let message = message.into();
        let transition = self.transition(stage, StageStatus::Error, Some(message.clone()))?;
        self.stage_mut(stage).finished_at = Some(transition.transitioned_at);
        warn!(%stage, %message, "Stage failed");
        Ok(transition)
    }

    /// Cancel the running stage
    ///
    /// Only a running stage whose remote operation supports it may be
    /// canceled. The stage ends in `error` with [`CANCELED_MESSAGE`].
    pub fn cancel(&mut self, stage: StageId) -> Result<StateTransition> {
        if !stage.supports_cancel() {
            return Err(ReviewError::CancelUnsupported(stage));
        }
        self.require_running(stage)?;
        self.stage_mut(stage).append_log(CANCEL_LOG_LINE);
        let transition = self.fail(stage, CANCELED_MESSAGE)?;
        info!(%stage, "Stage canceled by user");
        Ok(transition)
    }

    /// Apply one inbound stream event to a running stage
    pub fn apply_event(&mut self, stage: StageId, event: StageEvent) -> Result<EventOutcome> {
        self.require_running(stage)?;
        match event {
            StageEvent::Log { line } => {
                self.append_log(stage, &line)?;
                Ok(EventOutcome::Continue)
            }
            StageEvent::Error { error } => {
                let message = error.unwrap_or_else(|| format!("{} failed", stage));
                self.fail(stage, message.clone())?;
                Ok(EventOutcome::Failed { message })
            }
            done @ StageEvent::Done { .. } => {
                let result = done.into_result().unwrap_or_else(|| StageResult::from_value(Value::Null));
                self.complete(stage, &result)?;
                Ok(EventOutcome::Completed {
                    output_path: result.output_path,
                })
            }
            StageEvent::Progress { stage: step, value, message } => {
                debug!(%stage, step = ?step, value = ?value, message = ?message, "Sub-step progress");
                Ok(EventOutcome::Continue)
            }
            StageEvent::Stage { stage: step, message } => {
                debug!(%stage, step = ?step, message = ?message, "Sub-step boundary");
                Ok(EventOutcome::Continue)
            }
        }
    }

    /// Back to the initial state: extract ready, everything else blocked
    pub fn reset(&mut self) {
        for stage in StageId::ALL {
            let old = self.status(stage);
            let fresh = if stage.previous().is_none() {
                StageStatus::Ready
            } else {
                StageStatus::Blocked
            };
            self.stages[stage.position()] = StageState::new(stage, fresh);
            if old != fresh {
                self.emit_forced(stage, old, fresh);
            }
        }
        info!("Pipeline reset");
    }

    /// Rebuild stage statuses from a persisted job
    ///
    /// Stages flagged done are restored in order with their recorded output;
    /// the first unflagged stage becomes ready and the rest stay blocked. A
    /// done flag after a gap is ignored.
    pub fn restore_from_job(&mut self, job: &Job) {
        let mut previous_done = true;
        for stage in StageId::ALL {
            let old = self.status(stage);
            let mut state = StageState::new(stage, StageStatus::Blocked);

            if previous_done && job.steps.is_done(stage) {
                state.status = StageStatus::Done;
                state.output_path = job.outputs.get(stage).map(str::to_string);
                state.progress = Some(100);
            } else if previous_done {
                state.status = StageStatus::Ready;
                previous_done = false;
            } else if job.steps.is_done(stage) {
                warn!(%stage, job_id = %job.id, "Ignoring done flag after an incomplete stage");
            }

            let new = state.status;
            self.stages[stage.position()] = state;
            if old != new {
                self.emit_forced(stage, old, new);
            }
        }
        info!(job_id = %job.id, progress = self.overall_progress(), "Pipeline restored from job");
    }

    /// Recent log lines of a stage, for error reports
    pub fn log_tail(&self, stage: StageId, n: usize) -> Vec<String> {
        self.stage(stage)
            .log_tail(n.min(MAX_LOG_LINES))
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn require_running(&self, stage: StageId) -> Result<()> {
        if self.status(stage) == StageStatus::Running {
            Ok(())
        } else {
            Err(ReviewError::NotRunning(stage))
        }
    }

    // Reset and restore rebuild statuses wholesale, outside the transition table.
    fn emit_forced(&self, stage: StageId, old: StageStatus, new: StageStatus) {
        self.emit(VtpEvent::StageStatusChanged {
            stage,
            old_status: old,
            new_status: new,
            message: None,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: VtpEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use StageStatus::*;
        assert!(is_allowed(Blocked, Ready));
        assert!(is_allowed(Error, Running));
        assert!(!is_allowed(Blocked, Running));
        assert!(!is_allowed(Done, Running));
        assert!(!is_allowed(Ready, Done));
    }

    #[test]
    fn test_blocked_stage_cannot_begin() {
        let mut machine = PipelineStateMachine::new();
        let err = machine.begin(StageId::Sanitize).unwrap_err();
        assert!(matches!(
            err,
            ReviewError::InvalidTransition { from: StageStatus::Blocked, .. }
        ));
    }

    #[test]
    fn test_log_percentage_updates_progress() {
        let mut machine = PipelineStateMachine::new();
        machine.begin(StageId::Extract).unwrap();
        machine.append_log(StageId::Extract, "ffmpeg 37% elapsed").unwrap();
        assert_eq!(machine.stage(StageId::Extract).progress, Some(37));
        machine.append_log(StageId::Extract, "no number here").unwrap();
        assert_eq!(machine.stage(StageId::Extract).progress, Some(37));
    }
}
