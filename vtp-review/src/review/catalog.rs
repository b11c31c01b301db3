//! Segment catalog: the currently loaded page
//!
//! Each load replaces the page wholesale; pages are never merged. Loads are
//! last-request-wins: [`SegmentCatalog::begin_load`] issues a ticket and a
//! response carrying an older ticket is discarded.

use crate::models::{Segment, SegmentPage};
use std::collections::HashMap;
use tracing::{debug, warn};
use vtp_common::events::TrackSource;

/// Page metadata as reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageInfo {
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub has_more: bool,
}

impl PageInfo {
    /// Offset of the previous page, `None` on the first page
    pub fn previous_offset(&self) -> Option<usize> {
        if self.offset == 0 {
            None
        } else {
            Some(self.offset.saturating_sub(self.limit.max(1)))
        }
    }

    /// Offset of the next page, `None` on the last page
    pub fn next_offset(&self) -> Option<usize> {
        self.has_more.then(|| self.offset + self.limit.max(1))
    }
}

/// Handle for an in-flight page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    seq: u64,
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Default)]
pub struct SegmentCatalog {
    segments: Vec<Segment>,
    positions: HashMap<u32, usize>,
    page: PageInfo,
    clean_track_ref: Option<String>,
    original_track_ref: Option<String>,
    latest_request: u64,
    generation: u64,
}

impl SegmentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a page request; only the most recent ticket may complete
    pub fn begin_load(&mut self, offset: usize, limit: usize) -> LoadTicket {
        self.latest_request += 1;
        LoadTicket {
            seq: self.latest_request,
            offset,
            limit,
        }
    }

    /// Whether a ticket is still the most recent request
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.seq == self.latest_request
    }

    /// Install a page fetched for `ticket`
    ///
    /// Returns `false`, leaving the catalog untouched, when a newer request
    /// has been issued since.
    pub fn complete_load(&mut self, ticket: LoadTicket, page: SegmentPage) -> bool {
        if !self.is_current(&ticket) {
            debug!(
                offset = ticket.offset,
                limit = ticket.limit,
                "Discarding stale catalog page"
            );
            return false;
        }

        let mut positions = HashMap::with_capacity(page.segments.len());
        for (pos, segment) in page.segments.iter().enumerate() {
            if positions.insert(segment.index, pos).is_some() {
                warn!(index = segment.index, "Duplicate segment index in page");
            }
        }

        self.positions = positions;
        self.segments = page.segments;
        self.page = PageInfo {
            total: page.total,
            offset: page.offset,
            limit: page.limit,
            has_more: page.has_more,
        };
        self.clean_track_ref = page.clean_track_ref;
        self.original_track_ref = page.original_track_ref;
        self.generation += 1;
        true
    }

    /// Segments in canonical (backend) order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn get(&self, index: u32) -> Option<&Segment> {
        self.positions.get(&index).map(|pos| &self.segments[*pos])
    }

    pub fn contains(&self, index: u32) -> bool {
        self.positions.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn page_info(&self) -> PageInfo {
        self.page
    }

    /// Artifact path of a track, if the backend supplied one
    pub fn track_ref(&self, source: TrackSource) -> Option<&str> {
        match source {
            TrackSource::Clean => self.clean_track_ref.as_deref(),
            TrackSource::Original => self.original_track_ref.as_deref(),
        }
    }

    /// Monotonic counter bumped on every installed page
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
