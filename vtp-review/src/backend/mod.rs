//! Backend collaborators
//!
//! The engine reaches the remote pipeline only through these traits: stage
//! invocation (single response or line-delimited event stream), segment
//! pages, review persistence and job records. [`BackendClient`] implements
//! all four over HTTP; tests substitute in-memory fakes.

mod client;

pub use client::BackendClient;

use crate::error::BackendError;
use crate::models::{Job, JobPatch, NewJob, ReviewState, ReviewSubmission, SegmentPage};
use crate::pipeline::{StageRequest, StageResult};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw response bytes of a streamed stage, in arrival order
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, BackendError>>;

/// Runs pipeline stages on the backend
#[async_trait]
pub trait StageInvoker: Send + Sync {
    /// Run a stage and wait for its single terminal response
    async fn invoke(&self, request: &StageRequest) -> Result<StageResult, BackendError>;

    /// Start a streamed stage run
    ///
    /// The returned stream carries newline-delimited JSON events split at
    /// arbitrary byte boundaries. Dropping it aborts the run.
    async fn open_stream(&self, request: &StageRequest) -> Result<ByteStream, BackendError>;
}

/// Serves catalog pages
#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn fetch_page(&self, vod_url: &str, offset: usize, limit: usize) -> Result<SegmentPage, BackendError>;
}

/// Persists review decisions
#[async_trait]
pub trait DecisionSink: Send + Sync {
    /// Save votes; the backend echoes the stored state with its timestamp
    async fn save_review(&self, submission: &ReviewSubmission) -> Result<ReviewState, BackendError>;

    /// Load previously saved votes, if any
    async fn load_review(&self, vod_url: &str) -> Result<Option<ReviewState>, BackendError>;
}

/// Job record storage
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn list_jobs(&self) -> Result<Vec<Job>, BackendError>;

    async fn create_job(&self, job: &NewJob) -> Result<Job, BackendError>;

    /// Merge an update; present sections replace the stored ones
    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, BackendError>;

    /// Delete the job and its artifacts
    async fn purge_job(&self, id: &str) -> Result<(), BackendError>;

    /// Stop whatever the backend is still running for the job
    async fn cancel_job(&self, id: &str) -> Result<(), BackendError>;
}
