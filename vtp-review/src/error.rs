//! Error types for the review and pipeline engine

use thiserror::Error;
use vtp_common::events::{StageId, StageStatus};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, ReviewError>;

/// Engine errors
///
/// Raised by the pipeline state machine, job reconciliation and the
/// orchestrator. Review-side components (decisions, catalog, window,
/// playback) never return these; they record failures in their own status.
#[derive(Error, Debug)]
pub enum ReviewError {
    /// Status change not allowed by the stage lifecycle
    #[error("Stage {stage} cannot move from {from} to {to}")]
    InvalidTransition {
        stage: StageId,
        from: StageStatus,
        to: StageStatus,
    },

    /// Stage must be running for this operation
    #[error("Stage {0} is not running")]
    NotRunning(StageId),

    /// Stage's remote operation cannot be aborted
    #[error("Stage {0} does not support cancellation")]
    CancelUnsupported(StageId),

    /// A continue-or-start-over choice must be made first
    #[error("Resume decision pending for job {0}")]
    ResumePending(String),

    /// Continue/start-over called with nothing to decide
    #[error("No resume decision is pending")]
    NoResumePending,

    /// Operation needs a job that has not been created yet
    #[error("No active job")]
    NoActiveJob,

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend request failed
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Shared-library error (config, I/O)
    #[error(transparent)]
    Common(#[from] vtp_common::Error),
}

/// Backend client errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection, timeout or body-read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success status; detail taken from the response's `detail` field when present
    #[error("API error {status}: {detail}")]
    Api { status: u16, detail: String },

    /// Response body did not match the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::Parse(e.to_string())
        } else {
            BackendError::Network(e.to_string())
        }
    }
}
