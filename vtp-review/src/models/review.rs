//! Review persistence payloads

use serde::{Deserialize, Serialize};
use vtp_common::events::Decision;

/// One persisted vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub index: u32,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Decision persistence request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSubmission {
    pub vod_url: String,
    pub total_segments: usize,
    /// Number of segments decided so far
    pub review_index: usize,
    pub votes: Vec<VoteRecord>,
}

/// Persisted review state echoed by the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    #[serde(default)]
    pub total_segments: usize,
    #[serde(default)]
    pub review_index: usize,
    #[serde(default)]
    pub accepted: usize,
    #[serde(default)]
    pub rejected: usize,
    /// Server timestamp of the last save
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub votes: Vec<VoteRecord>,
}
