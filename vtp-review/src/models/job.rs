//! Persisted pipeline job

use serde::{Deserialize, Serialize};
use vtp_common::events::StageId;

/// Server-persisted job binding a source URL to stage completion
///
/// Timestamps are kept as the backend's ISO-8601 strings; they compare
/// correctly as strings because the backend writes one fixed format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub vod_url: String,
    #[serde(default)]
    pub streamer: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub steps: JobSteps,
    #[serde(default, deserialize_with = "outputs_or_default")]
    pub outputs: JobOutputs,
}

// The backend sends `"outputs": null` for jobs updated without outputs.
fn outputs_or_default<'de, D>(deserializer: D) -> Result<JobOutputs, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<JobOutputs>::deserialize(deserializer)?.unwrap_or_default())
}

/// Stage completion flags, keyed by backend step name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSteps {
    /// VOD fetched; precedes every engine-managed stage
    #[serde(default)]
    pub vod: bool,
    #[serde(default)]
    pub audio: bool,
    #[serde(default)]
    pub sanitize: bool,
    #[serde(default)]
    pub srt: bool,
    #[serde(default)]
    pub train: bool,
    #[serde(default)]
    pub tts: bool,
}

impl JobSteps {
    pub fn is_done(&self, stage: StageId) -> bool {
        match stage {
            StageId::Extract => self.audio,
            StageId::Sanitize => self.sanitize,
            StageId::Transcribe => self.srt,
            StageId::BuildDataset => self.train,
            StageId::Synthesize => self.tts,
        }
    }

    pub fn mark_done(&mut self, stage: StageId) {
        let flag = match stage {
            StageId::Extract => &mut self.audio,
            StageId::Sanitize => &mut self.sanitize,
            StageId::Transcribe => &mut self.srt,
            StageId::BuildDataset => &mut self.train,
            StageId::Synthesize => &mut self.tts,
        };
        *flag = true;
    }
}

/// Stage output locations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sanitize_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srt_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts_path: Option<String>,
}

impl JobOutputs {
    pub fn get(&self, stage: StageId) -> Option<&str> {
        let path = match stage {
            StageId::Extract => &self.audio_path,
            StageId::Sanitize => &self.sanitize_path,
            StageId::Transcribe => &self.srt_path,
            StageId::BuildDataset => &self.dataset_path,
            StageId::Synthesize => &self.tts_path,
        };
        path.as_deref()
    }

    pub fn set(&mut self, stage: StageId, path: String) {
        let slot = match stage {
            StageId::Extract => &mut self.audio_path,
            StageId::Sanitize => &mut self.sanitize_path,
            StageId::Transcribe => &mut self.srt_path,
            StageId::BuildDataset => &mut self.dataset_path,
            StageId::Synthesize => &mut self.tts_path,
        };
        *slot = Some(path);
    }
}

/// Body of a job creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub vod_url: String,
    pub streamer: String,
    pub title: String,
}

/// Body of a job update; the backend replaces each present section wholesale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<JobSteps>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<JobOutputs>,
}
