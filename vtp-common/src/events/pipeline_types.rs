//! Pipeline stage vocabulary
//!
//! Shared by the engine and the backend wire format. Stage identifiers use
//! the backend's step keys (`audio`, `sanitize`, `srt`, `train`, `tts`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageId {
    /// Extract audio from the fetched VOD
    #[serde(rename = "audio")]
    Extract,
    /// Denoise and segment speech
    #[serde(rename = "sanitize")]
    Sanitize,
    /// Speech-to-text subtitles
    #[serde(rename = "srt")]
    Transcribe,
    /// Training dataset assembly
    #[serde(rename = "train")]
    BuildDataset,
    /// Speech synthesis with the trained voice
    #[serde(rename = "tts")]
    Synthesize,
}

impl StageId {
    /// All stages in execution order
    pub const ALL: [StageId; 5] = [
        StageId::Extract,
        StageId::Sanitize,
        StageId::Transcribe,
        StageId::BuildDataset,
        StageId::Synthesize,
    ];

    /// Position in the execution order (0-based)
    pub fn position(self) -> usize {
        match self {
            StageId::Extract => 0,
            StageId::Sanitize => 1,
            StageId::Transcribe => 2,
            StageId::BuildDataset => 3,
            StageId::Synthesize => 4,
        }
    }

    pub fn previous(self) -> Option<StageId> {
        self.position().checked_sub(1).map(|i| Self::ALL[i])
    }

    pub fn next(self) -> Option<StageId> {
        Self::ALL.get(self.position() + 1).copied()
    }

    /// Backend step key
    pub fn key(self) -> &'static str {
        match self {
            StageId::Extract => "audio",
            StageId::Sanitize => "sanitize",
            StageId::Transcribe => "srt",
            StageId::BuildDataset => "train",
            StageId::Synthesize => "tts",
        }
    }

    /// Parse a backend step key
    pub fn from_key(key: &str) -> Option<StageId> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Job output field that records this stage's artifact
    pub fn output_key(self) -> &'static str {
        match self {
            StageId::Extract => "audioPath",
            StageId::Sanitize => "sanitizePath",
            StageId::Transcribe => "srtPath",
            StageId::BuildDataset => "datasetPath",
            StageId::Synthesize => "ttsPath",
        }
    }

    /// Whether the remote operation can be aborted mid-run
    pub fn supports_cancel(self) -> bool {
        matches!(self, StageId::Sanitize)
    }

    /// Whether the backend streams progress events for this stage
    pub fn streams_events(self) -> bool {
        matches!(self, StageId::Sanitize | StageId::Synthesize)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageId::Extract => "extract",
            StageId::Sanitize => "sanitize",
            StageId::Transcribe => "transcribe",
            StageId::BuildDataset => "build-dataset",
            StageId::Synthesize => "synthesize",
        };
        f.write_str(label)
    }
}

/// Stage lifecycle status
///
/// Transitions: blocked → ready → running → {done | error}; error → running on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Predecessor not done yet
    Blocked,
    /// May be invoked
    Ready,
    /// Remote operation in flight
    Running,
    /// Completed with an output
    Done,
    /// Failed or canceled; retriable
    Error,
}

impl StageStatus {
    /// Whether a run may start from this status
    pub fn can_start(self) -> bool {
        matches!(self, StageStatus::Ready | StageStatus::Error)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageStatus::Blocked => "blocked",
            StageStatus::Ready => "ready",
            StageStatus::Running => "running",
            StageStatus::Done => "done",
            StageStatus::Error => "error",
        };
        f.write_str(label)
    }
}
