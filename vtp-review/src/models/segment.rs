//! Segment descriptors and catalog pages

use serde::{Deserialize, Serialize};
use vtp_common::events::TrackSource;

/// SNR assumed for segments the backend did not measure
pub const MISSING_SNR_DB: f64 = 99.0;

/// Speech ratio assumed for segments the backend did not measure
pub const MISSING_SPEECH_RATIO: f64 = 1.0;

/// Candidate audio segment produced by the sanitize stage
///
/// Immutable once loaded. `clean_start`/`clean_end` locate the segment in the
/// sanitized track and are absent when sanitize rejected it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Stable identifier; not necessarily contiguous
    pub index: u32,
    /// Start in the original track (seconds)
    pub start: f64,
    /// End in the original track (seconds)
    pub end: f64,
    #[serde(default)]
    pub clean_start: Option<f64>,
    #[serde(default)]
    pub clean_end: Option<f64>,
    #[serde(default)]
    pub snr_db: Option<f64>,
    /// Fraction of the segment classified as speech, 0..1
    #[serde(default)]
    pub speech_ratio: Option<f64>,
    #[serde(default)]
    pub clip_ratio: Option<f64>,
    /// Overall quality score, 0..1
    #[serde(default)]
    pub quality: Option<f64>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub reject_reason: Vec<String>,
}

impl Segment {
    /// Segment with only original bounds; quality signals unset
    pub fn new(index: u32, start: f64, end: f64) -> Self {
        Self {
            index,
            start,
            end,
            clean_start: None,
            clean_end: None,
            snr_db: None,
            speech_ratio: None,
            clip_ratio: None,
            quality: None,
            labels: Vec::new(),
            reject_reason: Vec::new(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Bounds in the clean track, when sanitize retained the segment
    pub fn clean_bounds(&self) -> Option<(f64, f64)> {
        match (self.clean_start, self.clean_end) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }

    /// Playback bounds for a track, falling back to the original bounds
    pub fn bounds(&self, source: TrackSource) -> (f64, f64) {
        match source {
            TrackSource::Clean => self.clean_bounds().unwrap_or((self.start, self.end)),
            TrackSource::Original => (self.start, self.end),
        }
    }

    pub fn snr_or_default(&self) -> f64 {
        self.snr_db.unwrap_or(MISSING_SNR_DB)
    }

    pub fn speech_or_default(&self) -> f64 {
        self.speech_ratio.unwrap_or(MISSING_SPEECH_RATIO)
    }

    /// Carries any label or upstream reject reason
    pub fn is_labeled(&self) -> bool {
        !self.labels.is_empty() || !self.reject_reason.is_empty()
    }
}

/// One page of the segment catalog as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPage {
    pub segments: Vec<Segment>,
    /// Segments across all pages
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    #[serde(default)]
    pub has_more: bool,
    /// Artifact path of the sanitized track
    #[serde(default)]
    pub clean_track_ref: Option<String>,
    /// Artifact path of the original extracted track
    #[serde(default)]
    pub original_track_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_bounds_require_both_offsets() {
        let mut segment = Segment::new(3, 10.0, 12.0);
        assert_eq!(segment.clean_bounds(), None);
        assert_eq!(segment.bounds(TrackSource::Clean), (10.0, 12.0));

        segment.clean_start = Some(4.0);
        assert_eq!(segment.clean_bounds(), None);

        segment.clean_end = Some(6.0);
        assert_eq!(segment.bounds(TrackSource::Clean), (4.0, 6.0));
        assert_eq!(segment.bounds(TrackSource::Original), (10.0, 12.0));
    }

    #[test]
    fn test_missing_signals_use_permissive_defaults() {
        let segment = Segment::new(0, 0.0, 1.0);
        assert_eq!(segment.snr_or_default(), 99.0);
        assert_eq!(segment.speech_or_default(), 1.0);
        assert!(!segment.is_labeled());
    }

    #[test]
    fn test_deserializes_camel_case_with_missing_fields() {
        let json = r#"{"index": 7, "start": 1.5, "end": 2.0, "snrDb": 12.5, "rejectReason": ["music"]}"#;
        let segment: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(segment.index, 7);
        assert_eq!(segment.snr_db, Some(12.5));
        assert!(segment.is_labeled());
        assert!((segment.duration() - 0.5).abs() < 1e-9);
    }
}
