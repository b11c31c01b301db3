//! HTTP client for the pipeline backend
//!
//! All routes hang off `{base_url}{api_prefix}`:
//!
//! | Route | Use |
//! |-------|-----|
//! | `POST /{stage}/run` | stage invocation (`audio`, `sanitize`, `srt`, `train`, `tts`) |
//! | `GET /sanitize/segments` | catalog page |
//! | `GET/POST /sanitize/review` | review persistence |
//! | `GET/POST /jobs`, `PUT /jobs/{id}`, `DELETE /jobs/{id}/purge` | job records |
//! | `POST /jobs/{id}/cancel` | stop the job's remote work |
//! | `GET /artifact?path=` | audio bytes |

use super::{ByteStream, DecisionSink, JobStore, SegmentSource, StageInvoker};
use crate::error::BackendError;
use crate::models::{Job, JobPatch, NewJob, ReviewState, ReviewSubmission, SegmentPage};
use crate::pipeline::{StageRequest, StageResult};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};
use vtp_common::config::BackendConfig;

const USER_AGENT: &str = concat!("vtp-review/", env!("CARGO_PKG_VERSION"));

/// Pipeline backend client
///
/// Plain requests use the configured timeout. Stage runs and streams do not
/// time out; extraction and sanitize legitimately take minutes.
#[derive(Clone)]
pub struct BackendClient {
    http_client: reqwest::Client,
    api_base: String,
    request_timeout: Duration,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.api_base(),
            request_timeout: config.request_timeout(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Addressable URL of an artifact (audio track) by backend path
    pub fn artifact_url(&self, path: &str) -> Result<String, BackendError> {
        Url::parse_with_params(&self.url("/artifact"), &[("path", path)])
            .map(String::from)
            .map_err(|e| BackendError::Parse(format!("invalid artifact URL: {}", e)))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = self.send(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))
    }

    fn stage_request(&self, request: &StageRequest) -> RequestBuilder {
        self.http_client
            .post(self.url(&request.path()))
            .json(&request.body())
    }
}

/// Build an API error from a failed response
///
/// Prefers the JSON `detail` field, then the raw body, then the status.
fn api_error(status: StatusCode, body: &str) -> BackendError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));

    BackendError::Api {
        status: status.as_u16(),
        detail,
    }
}

#[async_trait]
impl StageInvoker for BackendClient {
    async fn invoke(&self, request: &StageRequest) -> Result<StageResult, BackendError> {
        info!(stage = %request.stage, vod_url = %request.vod_url, "Invoking stage");
        let raw: Value = self.send_json(self.stage_request(request)).await?;
        Ok(StageResult::from_value(raw))
    }

    async fn open_stream(&self, request: &StageRequest) -> Result<ByteStream, BackendError> {
        info!(stage = %request.stage, vod_url = %request.vod_url, "Opening stage stream");
        let response = self.send(self.stage_request(request)).await?;
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(BackendError::from));
        Ok(stream.boxed())
    }
}

#[async_trait]
impl SegmentSource for BackendClient {
    async fn fetch_page(&self, vod_url: &str, offset: usize, limit: usize) -> Result<SegmentPage, BackendError> {
        debug!(vod_url, offset, limit, "Fetching segment page");
        let request = self
            .http_client
            .get(self.url("/sanitize/segments"))
            .query(&[
                ("vodUrl", vod_url.to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .timeout(self.request_timeout);
        self.send_json(request).await
    }
}

#[async_trait]
impl DecisionSink for BackendClient {
    async fn save_review(&self, submission: &ReviewSubmission) -> Result<ReviewState, BackendError> {
        debug!(vod_url = %submission.vod_url, votes = submission.votes.len(), "Saving review");
        let request = self
            .http_client
            .post(self.url("/sanitize/review"))
            .json(submission)
            .timeout(self.request_timeout);
        self.send_json(request).await
    }

    async fn load_review(&self, vod_url: &str) -> Result<Option<ReviewState>, BackendError> {
        let request = self
            .http_client
            .get(self.url("/sanitize/review"))
            .query(&[("vodUrl", vod_url)])
            .timeout(self.request_timeout);
        match self.send_json(request).await {
            Ok(state) => Ok(Some(state)),
            Err(BackendError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl JobStore for BackendClient {
    async fn list_jobs(&self) -> Result<Vec<Job>, BackendError> {
        let request = self.http_client.get(self.url("/jobs")).timeout(self.request_timeout);
        self.send_json(request).await
    }

    async fn create_job(&self, job: &NewJob) -> Result<Job, BackendError> {
        let request = self
            .http_client
            .post(self.url("/jobs"))
            .json(job)
            .timeout(self.request_timeout);
        self.send_json(request).await
    }

    async fn update_job(&self, id: &str, patch: &JobPatch) -> Result<Job, BackendError> {
        let request = self
            .http_client
            .put(self.url(&format!("/jobs/{}", id)))
            .json(patch)
            .timeout(self.request_timeout);
        self.send_json(request).await
    }

    async fn purge_job(&self, id: &str) -> Result<(), BackendError> {
        let request = self
            .http_client
            .delete(self.url(&format!("/jobs/{}/purge", id)))
            .timeout(self.request_timeout);
        self.send(request).await?;
        Ok(())
    }

    async fn cancel_job(&self, id: &str) -> Result<(), BackendError> {
        info!(job_id = id, "Canceling job on backend");
        let request = self
            .http_client
            .post(self.url(&format!("/jobs/{}/cancel", id)))
            .timeout(self.request_timeout);
        self.send(request).await?;
        Ok(())
    }
}
