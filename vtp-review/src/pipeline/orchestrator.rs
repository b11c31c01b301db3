//! Pipeline session: stage runs bound to a persisted job
//!
//! Ties the state machine, the stage runner and job reconciliation together.
//! Every mutating call is refused while a resume decision is pending.

use crate::backend::{JobStore, StageInvoker};
use crate::error::Result;
use crate::jobs::{EnterOutcome, JobReconciler};
use crate::models::Job;
use crate::pipeline::machine::PipelineStateMachine;
use crate::pipeline::request::StageRequest;
use crate::pipeline::runner::{StageOutcome, StageRunner};
use crate::pipeline::stage::StageState;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use vtp_common::events::{EventBus, StageId};

pub struct PipelineOrchestrator {
    machine: Arc<Mutex<PipelineStateMachine>>,
    runner: StageRunner,
    jobs: Mutex<JobReconciler>,
}

impl PipelineOrchestrator {
    pub fn new(invoker: Arc<dyn StageInvoker>, store: Arc<dyn JobStore>, events: EventBus) -> Self {
        let machine = Arc::new(Mutex::new(
            PipelineStateMachine::new().with_event_bus(events.clone()),
        ));
        Self {
            runner: StageRunner::new(Arc::clone(&machine), invoker),
            machine,
            jobs: Mutex::new(JobReconciler::new(store).with_event_bus(events)),
        }
    }

    pub fn machine(&self) -> &Arc<Mutex<PipelineStateMachine>> {
        &self.machine
    }

    /// Enter the pipeline for a source URL, reconciling with any persisted job
    pub async fn enter(&self, vod_url: &str) -> Result<EnterOutcome> {
        let mut jobs = self.jobs.lock().await;
        let mut machine = self.machine.lock().await;
        jobs.enter(vod_url, &mut machine).await
    }

    /// Resolve a pending resume decision by continuing the persisted job
    pub async fn continue_job(&self) -> Result<Job> {
        let mut jobs = self.jobs.lock().await;
        let mut machine = self.machine.lock().await;
        jobs.continue_job(&mut machine).cloned()
    }

    /// Resolve a pending resume decision by purging and recreating the job
    pub async fn start_over(&self) -> Result<Job> {
        let mut jobs = self.jobs.lock().await;
        let mut machine = self.machine.lock().await;
        jobs.start_over(&mut machine).await.cloned()
    }

    /// Run a stage and record its completion in the job
    ///
    /// The job is created on the first run if none exists yet.
    pub async fn run_stage(&self, request: &StageRequest) -> Result<StageOutcome> {
        {
            let mut jobs = self.jobs.lock().await;
            let streamer = request.streamer.as_deref().unwrap_or_default();
            jobs.ensure_job(&request.vod_url, streamer, "").await?;
        }

        let outcome = self.runner.run(request).await?;

        if let StageOutcome::Completed { output_path } = &outcome {
            let mut jobs = self.jobs.lock().await;
            jobs.record_completion(request.stage, output_path.as_deref()).await?;
        }
        Ok(outcome)
    }

    /// Cancel a running stage locally, then on the backend
    ///
    /// The local run is stopped even when the backend cancel fails; that
    /// failure is still returned.
    pub async fn cancel(&self, stage: StageId) -> Result<()> {
        self.jobs.lock().await.ensure_ready()?;
        info!(%stage, "Cancel requested");
        self.runner.cancel(stage).await?;
        if let Err(e) = self.jobs.lock().await.cancel_remote().await {
            warn!(%stage, error = %e, "Backend job cancel failed");
            return Err(e);
        }
        Ok(())
    }

    pub async fn current_job(&self) -> Option<Job> {
        self.jobs.lock().await.current().cloned()
    }

    pub async fn pending_job(&self) -> Option<Job> {
        self.jobs.lock().await.pending().cloned()
    }

    /// Copy of every stage's state, in pipeline order
    pub async fn snapshot(&self) -> Vec<StageState> {
        self.machine.lock().await.stages().to_vec()
    }

    pub async fn overall_progress(&self) -> u8 {
        self.machine.lock().await.overall_progress()
    }

    pub async fn is_review_unlocked(&self) -> bool {
        self.machine.lock().await.is_review_unlocked()
    }
}
