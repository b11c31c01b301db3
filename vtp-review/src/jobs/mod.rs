//! Job reconciliation
//!
//! A job is the server's record of which stages finished for a source URL.
//! Re-entering a pipeline looks the job up; when the persisted job is not
//! the one this session is already tracking, the caller must choose to
//! continue it or start over before anything else mutates.

use crate::backend::JobStore;
use crate::error::{ReviewError, Result};
use crate::models::{Job, JobPatch, NewJob};
use crate::pipeline::PipelineStateMachine;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use vtp_common::events::{EventBus, StageId, VtpEvent};

/// Result of entering a pipeline for a source URL
#[derive(Debug, Clone, PartialEq)]
pub enum EnterOutcome {
    /// No persisted job; the pipeline starts fresh
    Fresh,
    /// The persisted job is the one already tracked; stages restored from it
    Resumed { job_id: String },
    /// A different persisted job exists; continue or start over first
    ConflictPending { job_id: String },
}

/// Most recently updated job for a URL
///
/// Jobs without `updated_at` lose to any job that has one.
pub fn latest_job_for<'a>(jobs: &'a [Job], vod_url: &str) -> Option<&'a Job> {
    jobs.iter()
        .filter(|job| job.vod_url == vod_url)
        .max_by(|a, b| a.updated_at.cmp(&b.updated_at))
}

pub struct JobReconciler {
    store: Arc<dyn JobStore>,
    current: Option<Job>,
    pending: Option<Job>,
    events: Option<EventBus>,
}

impl JobReconciler {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            current: None,
            pending: None,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn current(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    /// Job awaiting a continue-or-start-over choice
    pub fn pending(&self) -> Option<&Job> {
        self.pending.as_ref()
    }

    /// Look up the persisted job for `vod_url` and reconcile the pipeline
    pub async fn enter(&mut self, vod_url: &str, machine: &mut PipelineStateMachine) -> Result<EnterOutcome> {
        let jobs = self.store.list_jobs().await?;
        let Some(found) = latest_job_for(&jobs, vod_url).cloned() else {
            info!(vod_url, "No persisted job; starting fresh");
            self.current = None;
            self.pending = None;
            machine.reset();
            return Ok(EnterOutcome::Fresh);
        };

        let tracked = self.current.as_ref().map(|job| job.id.as_str());
        if tracked == Some(found.id.as_str()) {
            machine.restore_from_job(&found);
            let job_id = found.id.clone();
            self.current = Some(found);
            self.pending = None;
            info!(%job_id, "Resumed tracked job");
            return Ok(EnterOutcome::Resumed { job_id });
        }

        let job_id = found.id.clone();
        info!(%job_id, vod_url, "Persisted job found; awaiting resume decision");
        self.emit(VtpEvent::ResumeDecisionRequired {
            job_id: job_id.clone(),
            source_url: vod_url.to_string(),
            timestamp: Utc::now(),
        });
        self.pending = Some(found);
        Ok(EnterOutcome::ConflictPending { job_id })
    }

    /// Adopt the pending job and restore stages from it
    pub fn continue_job(&mut self, machine: &mut PipelineStateMachine) -> Result<&Job> {
        let job = self.pending.take().ok_or(ReviewError::NoResumePending)?;
        machine.restore_from_job(&job);
        info!(job_id = %job.id, "Continuing persisted job");
        Ok(&*self.current.insert(job))
    }

    /// Purge the pending job and recreate it empty
    pub async fn start_over(&mut self, machine: &mut PipelineStateMachine) -> Result<&Job> {
        let old = self.pending.as_ref().ok_or(ReviewError::NoResumePending)?;
        let old_id = old.id.clone();
        let new_job = NewJob {
            vod_url: old.vod_url.clone(),
            streamer: old.streamer.clone().unwrap_or_default(),
            title: old.title.clone().unwrap_or_default(),
        };

        self.store.purge_job(&old_id).await?;
        self.emit(VtpEvent::JobUpdated {
            job_id: old_id.clone(),
            timestamp: Utc::now(),
        });
        self.pending = None;
        machine.reset();

        let created = self.store.create_job(&new_job).await?;
        info!(old_job_id = %old_id, job_id = %created.id, "Started over with a new job");
        self.emit(VtpEvent::JobUpdated {
            job_id: created.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(&*self.current.insert(created))
    }

    /// Ask the backend to stop the current job's work
    ///
    /// Returns the canceled job id; `None` when no job is tracked.
    pub async fn cancel_remote(&self) -> Result<Option<String>> {
        let Some(job) = &self.current else {
            return Ok(None);
        };
        self.store.cancel_job(&job.id).await?;
        info!(job_id = %job.id, "Canceled job on backend");
        Ok(Some(job.id.clone()))
    }

    /// Fail while a resume decision is outstanding
    pub fn ensure_ready(&self) -> Result<()> {
        match &self.pending {
            Some(job) => Err(ReviewError::ResumePending(job.id.clone())),
            None => Ok(()),
        }
    }

    /// Current job, created on first use
    pub async fn ensure_job(&mut self, vod_url: &str, streamer: &str, title: &str) -> Result<&Job> {
        self.ensure_ready()?;
        if let Some(job) = self.current.as_ref().filter(|job| job.vod_url != vod_url) {
            return Err(ReviewError::InvalidInput(format!(
                "job {} tracks {}, not {}",
                job.id, job.vod_url, vod_url
            )));
        }
        if self.current.is_none() {
            let created = self
                .store
                .create_job(&NewJob {
                    vod_url: vod_url.to_string(),
                    streamer: streamer.to_string(),
                    title: title.to_string(),
                })
                .await?;
            info!(job_id = %created.id, vod_url, "Created job");
            self.emit(VtpEvent::JobUpdated {
                job_id: created.id.clone(),
                timestamp: Utc::now(),
            });
            self.current = Some(created);
        }
        self.current.as_ref().ok_or(ReviewError::NoActiveJob)
    }

    /// Persist a finished stage into the current job
    ///
    /// The update carries the full step and output sets since the backend
    /// replaces each section wholesale.
    pub async fn record_completion(&mut self, stage: StageId, output_path: Option<&str>) -> Result<&Job> {
        self.ensure_ready()?;
        let job = self.current.as_ref().ok_or(ReviewError::NoActiveJob)?;

        let mut steps = job.steps.clone();
        steps.mark_done(stage);
        let mut outputs = job.outputs.clone();
        match output_path {
            Some(path) => outputs.set(stage, path.to_string()),
            None => warn!(%stage, job_id = %job.id, "Stage finished without an output path"),
        }
        if stage == StageId::Extract {
            steps.vod = true;
        }

        let patch = JobPatch {
            steps: Some(steps),
            outputs: Some(outputs),
        };
        let updated = self.store.update_job(&job.id, &patch).await?;
        info!(job_id = %updated.id, %stage, "Recorded stage completion");
        self.emit(VtpEvent::JobUpdated {
            job_id: updated.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(&*self.current.insert(updated))
    }

    fn emit(&self, event: VtpEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}
