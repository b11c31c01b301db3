//! Auto-triage heuristics
//!
//! Pure functions: threshold-based batch rejection over pending segments and
//! advisory sanitize-settings corrections for degenerate runs.

mod settings;
mod suggest;

pub use settings::{SanitizeMode, SanitizePreset, SanitizeProfile, SanitizeSettings};
pub use suggest::{suggest_correction, suggest_from_stage_failure, Suggestion, SuggestionReason};

use crate::models::Segment;
use vtp_common::config::ReviewConfig;

/// Auto-reject floors; a segment below any one of them is rejected
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoRejectThresholds {
    pub snr_floor_db: f64,
    pub speech_floor: f64,
    pub duration_floor_secs: f64,
}

impl Default for AutoRejectThresholds {
    fn default() -> Self {
        Self::from(&ReviewConfig::default())
    }
}

impl From<&ReviewConfig> for AutoRejectThresholds {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            snr_floor_db: config.snr_floor_db,
            speech_floor: config.speech_floor,
            duration_floor_secs: config.duration_floor_secs,
        }
    }
}

impl AutoRejectThresholds {
    /// Missing SNR counts as 99 dB and missing speech ratio as 1.0, so an
    /// unmeasured signal never triggers a rejection on its own.
    pub fn should_reject(&self, segment: &Segment) -> bool {
        segment.snr_or_default() < self.snr_floor_db
            || segment.speech_or_default() < self.speech_floor
            || segment.duration() < self.duration_floor_secs
    }
}

/// Indices of the segments to reject, in input order
///
/// The caller applies the result as a single batch.
pub fn auto_reject<'a, I>(pending: I, thresholds: &AutoRejectThresholds) -> Vec<u32>
where
    I: IntoIterator<Item = &'a Segment>,
{
    pending
        .into_iter()
        .filter(|s| thresholds.should_reject(s))
        .map(|s| s.index)
        .collect()
}
