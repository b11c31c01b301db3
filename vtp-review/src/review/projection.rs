//! Filter and sort projections over the loaded page
//!
//! Projections return segment indices and never reorder the catalog itself.
//! [`DeferredView`] holds the requested query separately from the computed
//! one: setting a query is O(1) and the projection is rebuilt on the next
//! read, always against the latest query, catalog and decisions.

use crate::models::Segment;
use crate::review::catalog::SegmentCatalog;
use crate::review::decisions::DecisionStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use vtp_common::events::Decision;

/// SNR below which a segment counts as noisy (dB)
pub const LOW_SNR_DB: f64 = 8.0;
/// Speech ratio below which a segment counts as mostly non-speech
pub const LOW_SPEECH_RATIO: f64 = 0.5;
/// Duration below which a segment counts as short (seconds)
pub const SHORT_DURATION_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SegmentFilter {
    #[default]
    All,
    LowSnr,
    LowSpeech,
    Short,
    Labeled,
}

impl SegmentFilter {
    pub fn matches(self, segment: &Segment) -> bool {
        match self {
            SegmentFilter::All => true,
            SegmentFilter::LowSnr => segment.snr_or_default() < LOW_SNR_DB,
            SegmentFilter::LowSpeech => segment.speech_or_default() < LOW_SPEECH_RATIO,
            SegmentFilter::Short => segment.duration() < SHORT_DURATION_SECS,
            SegmentFilter::Labeled => segment.is_labeled(),
        }
    }
}

/// Ascending sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Start,
    Duration,
    Snr,
    SpeechRatio,
}

impl SortOrder {
    fn key(self, segment: &Segment) -> f64 {
        match self {
            SortOrder::Start => segment.start,
            SortOrder::Duration => segment.duration(),
            SortOrder::Snr => segment.snr_or_default(),
            SortOrder::SpeechRatio => segment.speech_or_default(),
        }
    }

    /// Stable comparison; NaN keys sort last
    pub fn compare(self, a: &Segment, b: &Segment) -> Ordering {
        let (ka, kb) = (self.key(a), self.key(b));
        ka.partial_cmp(&kb).unwrap_or_else(|| ka.is_nan().cmp(&kb.is_nan()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub filter: SegmentFilter,
    pub sort: SortOrder,
}

/// Pending segments matching `query`, sorted, as indices
pub fn pending_view(segments: &[Segment], decisions: &DecisionStore, query: &ViewQuery) -> Vec<u32> {
    let mut pending: Vec<&Segment> = segments
        .iter()
        .filter(|s| decisions.is_pending(s.index) && query.filter.matches(s))
        .collect();
    pending.sort_by(|a, b| query.sort.compare(a, b));
    pending.into_iter().map(|s| s.index).collect()
}

/// Segments holding `decision`, in catalog order
pub fn decided_view(segments: &[Segment], decisions: &DecisionStore, decision: Decision) -> Vec<u32> {
    segments
        .iter()
        .filter(|s| decisions.get(s.index) == Some(decision))
        .map(|s| s.index)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ViewKey {
    query: ViewQuery,
    catalog_generation: u64,
    decisions_revision: u64,
}

/// Deferred, memoized pending view
#[derive(Debug, Default)]
pub struct DeferredView {
    requested: ViewQuery,
    computed_for: Option<ViewKey>,
    indices: Vec<u32>,
}

impl DeferredView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new query without recomputing
    pub fn request(&mut self, query: ViewQuery) {
        self.requested = query;
    }

    pub fn query(&self) -> ViewQuery {
        self.requested
    }

    /// Whether the cached projection lags the inputs
    pub fn is_stale(&self, catalog: &SegmentCatalog, decisions: &DecisionStore) -> bool {
        self.computed_for != Some(self.key(catalog, decisions))
    }

    /// Bring the projection up to date
    ///
    /// Returns the previous projection when a recompute happened, so callers
    /// can reconcile anything positioned against it.
    pub fn refresh(&mut self, catalog: &SegmentCatalog, decisions: &DecisionStore) -> Option<Vec<u32>> {
        let key = self.key(catalog, decisions);
        if self.computed_for == Some(key) {
            return None;
        }
        let next = pending_view(catalog.segments(), decisions, &key.query);
        self.computed_for = Some(key);
        Some(std::mem::replace(&mut self.indices, next))
    }

    /// Last computed projection
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    fn key(&self, catalog: &SegmentCatalog, decisions: &DecisionStore) -> ViewKey {
        ViewKey {
            query: self.requested,
            catalog_generation: catalog.generation(),
            decisions_revision: decisions.revision(),
        }
    }
}
