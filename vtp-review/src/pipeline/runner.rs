//! Stage execution against the backend
//!
//! Drives one stage run from `begin` to a terminal status. Streamed stages
//! decode the response line by line and feed each event to the state
//! machine; single-response stages show an elapsed-time estimate while the
//! request is outstanding. Every path ends in `done` or `error`, never left
//! `running`.

use crate::backend::StageInvoker;
use crate::error::Result;
use crate::pipeline::estimate::{ElapsedEstimator, ESTIMATE_TICK};
use crate::pipeline::machine::{EventOutcome, PipelineStateMachine};
use crate::pipeline::request::StageRequest;
use crate::pipeline::stream::{parse_line, LineDecoder};
use crate::triage::{suggest_from_stage_failure, Suggestion};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vtp_common::events::{StageId, StageStatus};

/// Log lines quoted when a stream ends without a result
const RECENT_LOG_LINES: usize = 5;

/// How a stage run ended
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Completed {
        output_path: Option<String>,
    },
    Failed {
        message: String,
        /// Advisory settings change for sanitize runs that kept nothing
        suggestion: Option<Suggestion>,
    },
    Canceled,
}

impl StageOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StageOutcome::Completed { .. })
    }
}

pub struct StageRunner {
    machine: Arc<Mutex<PipelineStateMachine>>,
    invoker: Arc<dyn StageInvoker>,
    cancel_tokens: Mutex<HashMap<StageId, CancellationToken>>,
}

impl StageRunner {
    pub fn new(machine: Arc<Mutex<PipelineStateMachine>>, invoker: Arc<dyn StageInvoker>) -> Self {
        Self {
            machine,
            invoker,
            cancel_tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn machine(&self) -> &Arc<Mutex<PipelineStateMachine>> {
        &self.machine
    }

    /// Run a stage to completion
    ///
    /// Fails up front (without touching the stage) when the stage cannot
    /// start. Backend failures are recorded in the stage and reported as
    /// [`StageOutcome::Failed`], not as errors.
    pub async fn run(&self, request: &StageRequest) -> Result<StageOutcome> {
        let stage = request.stage;
        let token = {
            // Token lock first, then the machine: same order as `cancel`, so a
            // cancel can never see a running stage without its token
            let mut tokens = self.cancel_tokens.lock().await;
            self.machine.lock().await.begin(stage)?;
            stage.streams_events().then(|| {
                let token = CancellationToken::new();
                tokens.insert(stage, token.clone());
                token
            })
        };

        let outcome = match token {
            Some(token) => {
                let outcome = self.run_streamed(request, &token).await;
                self.cancel_tokens.lock().await.remove(&stage);
                outcome?
            }
            None => self.run_single(request).await?,
        };

        match &outcome {
            StageOutcome::Completed { output_path } => {
                info!(%stage, output = ?output_path, "Stage run completed")
            }
            StageOutcome::Failed { message, .. } => warn!(%stage, %message, "Stage run failed"),
            StageOutcome::Canceled => info!(%stage, "Stage run canceled"),
        }
        Ok(outcome)
    }

    /// Cancel a running stage
    ///
    /// The stage moves to `error` immediately and the in-flight stream is
    /// dropped. Stopping the backend's work on the job is up to the caller
    /// that tracks it.
    pub async fn cancel(&self, stage: StageId) -> Result<()> {
        let tokens = self.cancel_tokens.lock().await;
        self.machine.lock().await.cancel(stage)?;
        if let Some(token) = tokens.get(&stage) {
            token.cancel();
        }
        Ok(())
    }

    async fn run_single(&self, request: &StageRequest) -> Result<StageOutcome> {
        let stage = request.stage;
        let estimator = ElapsedEstimator::for_stage(stage);
        let started = Instant::now();
        let mut tick = interval(ESTIMATE_TICK);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let call = self.invoker.invoke(request);
        tokio::pin!(call);

        let response = loop {
            tokio::select! {
                response = &mut call => break response,
                _ = tick.tick(), if estimator.is_some() => {
                    if let Some(estimator) = estimator {
                        let percent = estimator.percent_at(started.elapsed());
                        self.machine.lock().await.set_progress(stage, percent)?;
                    }
                }
            }
        };

        match response {
            Ok(result) => {
                let output_path = result.output_path.clone();
                self.machine.lock().await.complete(stage, &result)?;
                Ok(StageOutcome::Completed { output_path })
            }
            Err(e) => self.fail(request, e.to_string()).await,
        }
    }

    async fn run_streamed(&self, request: &StageRequest, token: &CancellationToken) -> Result<StageOutcome> {
        let stage = request.stage;
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(StageOutcome::Canceled),
            opened = self.invoker.open_stream(request) => opened,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return self.fail(request, e.to_string()).await,
        };

        let mut decoder = LineDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(StageOutcome::Canceled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => {
                    for line in decoder.push(&bytes) {
                        if let Some(outcome) = self.apply_line(request, &line, token).await? {
                            return Ok(outcome);
                        }
                    }
                }
                Some(Err(e)) => return self.fail(request, e.to_string()).await,
                None => break,
            }
        }

        if let Some(line) = decoder.finish() {
            if let Some(outcome) = self.apply_line(request, &line, token).await? {
                return Ok(outcome);
            }
        }

        let recent = self.machine.lock().await.log_tail(stage, RECENT_LOG_LINES);
        let message = if recent.is_empty() {
            format!("{} finished without result", stage)
        } else {
            format!("{} finished without result. Recent logs:\n{}", stage, recent.join("\n"))
        };
        self.fail(request, message).await
    }

    async fn apply_line(
        &self,
        request: &StageRequest,
        line: &str,
        token: &CancellationToken,
    ) -> Result<Option<StageOutcome>> {
        let Some(event) = parse_line(line) else {
            return Ok(None);
        };

        let mut machine = self.machine.lock().await;
        if token.is_cancelled() {
            return Ok(Some(StageOutcome::Canceled));
        }
        let outcome = match machine.apply_event(request.stage, event)? {
            EventOutcome::Continue => None,
            EventOutcome::Completed { output_path } => Some(StageOutcome::Completed { output_path }),
            EventOutcome::Failed { message } => {
                let suggestion = Self::suggestion_for(request, &message);
                Some(StageOutcome::Failed { message, suggestion })
            }
        };
        Ok(outcome)
    }

    async fn fail(&self, request: &StageRequest, message: String) -> Result<StageOutcome> {
        let mut machine = self.machine.lock().await;
        if machine.status(request.stage) != StageStatus::Running {
            // Canceled while the request was in flight
            debug!(stage = %request.stage, %message, "Ignoring failure of a stage no longer running");
            return Ok(StageOutcome::Canceled);
        }
        machine.fail(request.stage, message.clone())?;
        let suggestion = Self::suggestion_for(request, &message);
        Ok(StageOutcome::Failed { message, suggestion })
    }

    fn suggestion_for(request: &StageRequest, message: &str) -> Option<Suggestion> {
        if request.stage != StageId::Sanitize {
            return None;
        }
        suggest_from_stage_failure(message, &request.sanitize_settings())
    }
}
