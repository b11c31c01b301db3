//! In-memory backend implementing every collaborator trait

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vtp_review::backend::{ByteStream, DecisionSink, JobStore, SegmentSource, StageInvoker};
use vtp_review::models::{Job, JobPatch, NewJob, ReviewState, ReviewSubmission, SegmentPage};
use vtp_review::pipeline::{StageRequest, StageResult};
use vtp_review::BackendError;

pub const SAVED_AT: &str = "2024-05-01T12:00:00";

#[derive(Default)]
pub struct FakeBackend {
    /// Chunks served by `open_stream`
    pub stream_chunks: Mutex<Vec<Vec<u8>>>,
    /// Keep the stream open after the chunks (never ends on its own)
    pub hold_stream_open: bool,
    /// Response of the next `invoke`; a default result otherwise
    pub invoke_result: Mutex<Option<Result<StageResult, BackendError>>>,
    pub invoke_delay: Duration,
    pub requests: Mutex<Vec<StageRequest>>,
    /// Pages by offset
    pub pages: Mutex<HashMap<usize, SegmentPage>>,
    pub page_error: Mutex<Option<BackendError>>,
    pub jobs: Mutex<Vec<Job>>,
    pub updates: Mutex<Vec<(String, JobPatch)>>,
    pub purged: Mutex<Vec<String>>,
    pub canceled: Mutex<Vec<String>>,
    pub saved: Mutex<Vec<ReviewSubmission>>,
    next_job: AtomicU32,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(lines: &[&str]) -> Self {
        let backend = Self::new();
        backend.set_stream_lines(lines);
        backend
    }

    /// Serve `lines` as one NDJSON body split into 7-byte chunks
    pub fn set_stream_lines(&self, lines: &[&str]) {
        let body: Vec<u8> = lines.iter().flat_map(|l| format!("{}\n", l).into_bytes()).collect();
        *self.stream_chunks.lock().unwrap() = body.chunks(7).map(<[u8]>::to_vec).collect();
    }

    pub fn with_page(self, page: SegmentPage) -> Self {
        self.pages.lock().unwrap().insert(page.offset, page);
        self
    }

    pub fn with_job(self, job: Job) -> Self {
        self.jobs.lock().unwrap().push(job);
        self
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.jobs.lock().unwrap().iter().map(|j| j.id.clone()).collect()
    }
}

#[async_trait]
impl StageInvoker for FakeBackend {
    async fn invoke(&self, request: &StageRequest) -> Result<StageResult, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.invoke_delay.is_zero() {
            tokio::time::sleep(self.invoke_delay).await;
        }
        let canned = self.invoke_result.lock().unwrap().take();
        canned.unwrap_or_else(|| {
            Ok(StageResult::from_value(json!({
                "outputPath": format!("out/{}", request.stage.key()),
                "log": [format!("{} ok", request.stage)]
            })))
        })
    }

    async fn open_stream(&self, request: &StageRequest) -> Result<ByteStream, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        let chunks: Vec<Result<Vec<u8>, BackendError>> =
            self.stream_chunks.lock().unwrap().drain(..).map(Ok).collect();
        let body = stream::iter(chunks);
        if self.hold_stream_open {
            Ok(body.chain(stream::pending()).boxed())
        } else {
            Ok(body.boxed())
        }
    }
}

#[async_trait]
impl SegmentSource for FakeBackend {
    async fn fetch_page(&self, _vod_url: &str, offset: usize, _limit: usize) -> Result<SegmentPage, BackendError> {
        if let Some(e) = self.page_error.lock().unwrap().take() {
            return Err(e);
        }
        self.pages
            .lock()
            .unwrap()
            .get(&offset)
            .cloned()
            .ok_or_else(|| BackendError::Api {
                status: 404,
                detail: "no such page".to_string(),
            })
    }
}

#[async_trait]
impl DecisionSink for FakeBackend {
    async fn save_review(&self, submission: &ReviewSubmission) -> Result<ReviewState, BackendError> {
        self.saved.lock().unwrap().push(submission.clone());
        Ok(ReviewState {
            total_segments: submission.total_segments,
            review_index: submission.review_index,
            accepted: 0,
            rejected: 0,
            updated_at: Some(SAVED_AT.to_string()),
            votes: submission.votes.clone(),
        })
    }

    async fn load_review(&self, vod_url: &str) -> Result<Option<ReviewState>, BackendError> {
        let saved = self.saved.lock().unwrap();
        Ok(saved.iter().rev().find(|s| s.vod_url == vod_url).map(|s| ReviewState {
            total_segments: s.total_segments,
            review_index: s.review_index,
            accepted: 0,
            rejected: 0,
            updated_at: Some(SAVED_AT.to_string()),
            votes: s.votes.clone(),
        }))
    }
}

#[async_trait]
impl JobStore for FakeBackend {
    async fn list_jobs(&self) -> Result<Vec<Job>, BackendError> {
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn create_job(&self, job: &NewJob) -> Result<Job, BackendError> {
        let n = self.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        let created = Job {
            id: format!("new-{}", n),
            vod_url: job.vod_url.clone(),
            streamer: Some(job.streamer.clone()),
            title: Some(job.title.clone()),
            created_at: Some(SAVED_AT.to_string()),
            updated_at: Some(SAVED_AT.to_string()),
            steps: Default::default(),
            outputs: Default::default(),
        };
        self.jobs.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, BackendError> {
        self.updates.lock().unwrap().push((id.to_string(), patch.clone()));
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.iter_mut().find(|j| j.id == id).ok_or_else(|| BackendError::Api {
            status: 404,
            detail: format!("job {} not found", id),
        })?;
        if let Some(steps) = &patch.steps {
            job.steps = steps.clone();
        }
        if let Some(outputs) = &patch.outputs {
            job.outputs = outputs.clone();
        }
        Ok(job.clone())
    }

    async fn purge_job(&self, id: &str) -> Result<(), BackendError> {
        self.purged.lock().unwrap().push(id.to_string());
        self.jobs.lock().unwrap().retain(|j| j.id != id);
        Ok(())
    }

    async fn cancel_job(&self, id: &str) -> Result<(), BackendError> {
        self.canceled.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
