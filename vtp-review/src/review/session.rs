//! Review session: one source URL under triage
//!
//! Owns the catalog page, the decision store, the deferred pending view,
//! the active segment and the list window. Every mutation announces itself
//! on the event bus once, after it has fully applied.
//!
//! The pending view is recomputed lazily: changing a filter, sort or
//! decision only marks it stale, and the next read rebuilds it and
//! reconciles the active segment against the new view. Readers therefore
//! take `&mut self`.
//!
//! Backend failures never escape as errors; they land in [`ReviewStatus`]
//! and the session keeps its prior state.

use crate::backend::{DecisionSink, SegmentSource};
use crate::error::BackendError;
use crate::models::{ReviewSubmission, Segment, SegmentPage, VoteRecord};
use crate::playback::TrackUrls;
use crate::review::catalog::{LoadTicket, PageInfo, SegmentCatalog};
use crate::review::decisions::{DecisionCounts, DecisionStore};
use crate::review::projection::{decided_view, DeferredView, SegmentFilter, SortOrder, ViewQuery};
use crate::review::selection::{move_next, move_prev, reconcile};
use crate::review::window::{RowDensity, WindowRange, WindowedList};
use crate::triage::{auto_reject, suggest_correction, AutoRejectThresholds, SanitizeSettings, Suggestion};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vtp_common::config::{ReviewConfig, ViewPreferences, ViewPreferencesStore};
use vtp_common::events::{Decision, EventBus, TrackSource, VtpEvent};

/// User-visible status of the session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewStatus {
    /// Last failure, dismissible
    pub error: Option<String>,
    /// Last informational notice
    pub notice: Option<String>,
    /// Server timestamp of the last successful save
    pub saved_at: Option<String>,
}

/// Review progress over the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewSummary {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub remaining: usize,
    /// Decided share of `total`, 0..=100
    pub percent_reviewed: u8,
}

/// Rows to materialize for the current scroll position
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRows {
    pub range: WindowRange,
    /// Segment indices of rows `range.start..range.end`
    pub indices: Vec<u32>,
}

pub struct ReviewSession {
    session_id: Uuid,
    source_url: String,
    catalog: SegmentCatalog,
    decisions: DecisionStore,
    view: DeferredView,
    active: Option<u32>,
    window: WindowedList,
    prefs: ViewPreferencesStore,
    thresholds: AutoRejectThresholds,
    page_size: usize,
    perf_mode_threshold: usize,
    status: ReviewStatus,
    events: EventBus,
}

impl ReviewSession {
    pub fn new(
        source_url: impl Into<String>,
        config: &ReviewConfig,
        prefs: ViewPreferencesStore,
        events: EventBus,
    ) -> Self {
        let density = RowDensity::from_preferences(&prefs.get());
        Self {
            session_id: Uuid::new_v4(),
            source_url: source_url.into(),
            catalog: SegmentCatalog::new(),
            decisions: DecisionStore::new(),
            view: DeferredView::new(),
            active: None,
            window: WindowedList::new(density),
            prefs,
            thresholds: AutoRejectThresholds::from(config),
            page_size: config.page_size.max(1),
            perf_mode_threshold: config.perf_mode_threshold,
            status: ReviewStatus::default(),
            events,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    pub fn decisions(&self) -> &DecisionStore {
        &self.decisions
    }

    pub fn status(&self) -> &ReviewStatus {
        &self.status
    }

    pub fn dismiss_error(&mut self) {
        self.status.error = None;
    }

    pub fn preferences(&self) -> ViewPreferences {
        self.prefs.get()
    }

    pub fn thresholds(&self) -> AutoRejectThresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: AutoRejectThresholds) {
        self.thresholds = thresholds;
    }

    // ---- catalog loading ----

    /// Register a page request; a later request supersedes this one
    pub fn begin_load(&mut self, offset: usize, limit: usize) -> LoadTicket {
        self.catalog.begin_load(offset, limit)
    }

    /// Apply the outcome of a page request
    ///
    /// Returns whether a page was installed. Stale outcomes (a newer request
    /// was issued) are dropped, successful or not.
    pub fn complete_load(&mut self, ticket: LoadTicket, outcome: Result<SegmentPage, BackendError>) -> bool {
        let page = match outcome {
            Ok(page) => page,
            Err(e) => {
                if self.catalog.is_current(&ticket) {
                    warn!(error = %e, offset = ticket.offset, "Segment page load failed");
                    self.status.error = Some(e.to_string());
                } else {
                    debug!(error = %e, "Ignoring failure of a superseded page load");
                }
                return false;
            }
        };

        let total = page.total;
        if !self.catalog.complete_load(ticket, page) {
            return false;
        }
        self.status.error = None;

        let info = self.catalog.page_info();
        info!(
            session_id = %self.session_id,
            offset = info.offset,
            count = self.catalog.len(),
            total,
            "Catalog page loaded"
        );
        self.events.emit_lossy(VtpEvent::CatalogLoaded {
            session_id: self.session_id,
            offset: info.offset,
            limit: info.limit,
            total,
            count: self.catalog.len(),
            timestamp: Utc::now(),
        });

        if total > self.perf_mode_threshold && !self.prefs.get().perf_mode {
            self.set_perf_mode(true);
            self.notify(format!(
                "Performance mode enabled for {} segments",
                total
            ));
        }

        self.sync_view();
        true
    }

    /// Fetch and install a page
    pub async fn load_page(&mut self, source: &dyn SegmentSource, offset: usize, limit: usize) -> bool {
        let ticket = self.begin_load(offset, limit);
        let outcome = source.fetch_page(&self.source_url, offset, limit).await;
        self.complete_load(ticket, outcome)
    }

    /// Fetch the first page at the configured page size
    pub async fn load_first_page(&mut self, source: &dyn SegmentSource) -> bool {
        self.load_page(source, 0, self.page_size).await
    }

    pub async fn load_next_page(&mut self, source: &dyn SegmentSource) -> bool {
        match self.catalog.page_info().next_offset() {
            Some(offset) => self.load_page(source, offset, self.page_size).await,
            None => false,
        }
    }

    pub async fn load_previous_page(&mut self, source: &dyn SegmentSource) -> bool {
        match self.catalog.page_info().previous_offset() {
            Some(offset) => self.load_page(source, offset, self.page_size).await,
            None => false,
        }
    }

    pub fn page_info(&self) -> PageInfo {
        self.catalog.page_info()
    }

    /// Playable URLs for the page's tracks
    pub fn track_urls<F>(&self, resolve: F) -> TrackUrls
    where
        F: Fn(&str) -> Option<String>,
    {
        TrackUrls {
            clean: self.catalog.track_ref(TrackSource::Clean).and_then(&resolve),
            original: self.catalog.track_ref(TrackSource::Original).and_then(&resolve),
        }
    }

    // ---- views and selection ----

    /// Pending segments under the current filter and sort
    pub fn pending_view(&mut self) -> &[u32] {
        self.sync_view();
        self.view.indices()
    }

    pub fn accepted_view(&self) -> Vec<u32> {
        decided_view(self.catalog.segments(), &self.decisions, Decision::Accept)
    }

    pub fn rejected_view(&self) -> Vec<u32> {
        decided_view(self.catalog.segments(), &self.decisions, Decision::Reject)
    }

    /// Active segment index
    pub fn active(&mut self) -> Option<u32> {
        self.sync_view();
        self.active
    }

    pub fn active_segment(&mut self) -> Option<&Segment> {
        let index = self.active()?;
        self.catalog.get(index)
    }

    /// Make a pending segment active; returns false if it is not in the view
    pub fn set_active(&mut self, index: u32) -> bool {
        self.sync_view();
        let Some(position) = self.view.indices().iter().position(|i| *i == index) else {
            return false;
        };
        self.window.ensure_visible(position);
        self.select(Some(index));
        true
    }

    pub fn move_next(&mut self) -> Option<u32> {
        self.sync_view();
        let next = move_next(self.view.indices(), self.active);
        self.navigate(next)
    }

    pub fn move_prev(&mut self) -> Option<u32> {
        self.sync_view();
        let prev = move_prev(self.view.indices(), self.active);
        self.navigate(prev)
    }

    pub fn query(&self) -> ViewQuery {
        self.view.query()
    }

    /// Takes effect on the next read
    pub fn set_filter(&mut self, filter: SegmentFilter) {
        let query = ViewQuery {
            filter,
            ..self.view.query()
        };
        self.view.request(query);
    }

    /// Takes effect on the next read
    pub fn set_sort(&mut self, sort: SortOrder) {
        let query = ViewQuery {
            sort,
            ..self.view.query()
        };
        self.view.request(query);
    }

    // ---- decisions ----

    /// Record a decision for a loaded segment
    ///
    /// Returns the previous decision, or `None` when the index is not loaded.
    pub fn decide(&mut self, index: u32, decision: Decision) -> Option<Option<Decision>> {
        if !self.catalog.contains(index) {
            debug!(index, "Ignoring decision for a segment not in the catalog");
            return None;
        }
        let previous = self.decisions.set_decision(index, decision);
        debug!(index, %decision, "Decision recorded");
        self.emit_decisions(vec![index], Some(decision));
        Some(previous)
    }

    /// Accept the active segment; returns its index
    pub fn accept_active(&mut self) -> Option<u32> {
        self.decide_active(Decision::Accept)
    }

    /// Reject the active segment; returns its index
    pub fn reject_active(&mut self) -> Option<u32> {
        self.decide_active(Decision::Reject)
    }

    /// Revert the latest decision change
    ///
    /// A segment that returns to pending becomes active again.
    pub fn undo(&mut self) -> Option<u32> {
        let catalog = &self.catalog;
        let outcome = self.decisions.undo(|index| catalog.contains(index))?;
        self.emit_decisions(vec![outcome.index], outcome.restored);

        self.sync_view();
        if outcome.restored.is_none() && self.view.indices().contains(&outcome.index) {
            self.select(Some(outcome.index));
        }
        Some(outcome.index)
    }

    /// Return a segment to pending without touching the undo history
    pub fn restore(&mut self, index: u32) -> bool {
        if self.decisions.restore_decision(index).is_none() {
            return false;
        }
        self.emit_decisions(vec![index], None);
        true
    }

    pub fn set_note(&mut self, index: u32, note: &str) {
        self.decisions.set_note(index, note);
    }

    /// Flip a segment's multi-select flag
    pub fn toggle_selected(&mut self, index: u32) -> bool {
        self.decisions.toggle_selected(index)
    }

    /// Apply `decision` to every multi-selected segment, then clear the set
    pub fn batch_selected(&mut self, decision: Decision) -> Vec<u32> {
        let catalog = &self.catalog;
        let targets: Vec<u32> = self
            .decisions
            .selected()
            .into_iter()
            .filter(|index| catalog.contains(*index))
            .collect();
        self.decisions.clear_selection();
        self.apply_batch(targets, decision)
    }

    /// Reject every pending segment under the auto-reject floors, as one batch
    pub fn auto_reject(&mut self) -> Vec<u32> {
        let decisions = &self.decisions;
        let pending = self
            .catalog
            .segments()
            .iter()
            .filter(|segment| decisions.is_pending(segment.index));
        let targets = auto_reject(pending, &self.thresholds);
        info!(session_id = %self.session_id, count = targets.len(), "Auto-reject");
        self.apply_batch(targets, Decision::Reject)
    }

    // ---- window ----

    /// Scroll input; returns whether a frame should be scheduled
    pub fn on_scroll(&mut self, offset: f64) -> bool {
        self.window.on_scroll(offset)
    }

    /// Animation frame; returns whether the window moved
    pub fn on_frame(&mut self) -> bool {
        self.window.on_frame()
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.window.set_viewport_height(height);
    }

    pub fn visible_rows(&mut self) -> VisibleRows {
        self.sync_view();
        let range = self.window.range();
        VisibleRows {
            range,
            indices: self.view.indices()[range.rows()].to_vec(),
        }
    }

    pub fn set_perf_mode(&mut self, enabled: bool) {
        self.update_prefs(|prefs| prefs.perf_mode = enabled);
    }

    pub fn set_compact(&mut self, enabled: bool) {
        self.update_prefs(|prefs| prefs.compact = enabled);
    }

    pub fn set_show_timeline(&mut self, enabled: bool) {
        self.update_prefs(|prefs| prefs.show_timeline = enabled);
    }

    pub fn set_show_trays(&mut self, enabled: bool) {
        self.update_prefs(|prefs| prefs.show_trays = enabled);
    }

    // ---- results ----

    pub fn counts(&self) -> DecisionCounts {
        self.decisions.counts()
    }

    pub fn summary(&self) -> ReviewSummary {
        let counts = self.decisions.counts();
        let total = self.catalog.page_info().total.max(self.catalog.len());
        let decided = counts.decided().min(total);
        let percent_reviewed = if total == 0 {
            0
        } else {
            ((decided as f64 / total as f64) * 100.0).round() as u8
        };
        ReviewSummary {
            total,
            accepted: counts.accepted,
            rejected: counts.rejected,
            remaining: total - decided,
            percent_reviewed,
        }
    }

    /// Decision-persistence body: decided segments only, with notes
    pub fn export_votes(&self) -> ReviewSubmission {
        let summary = self.summary();
        let votes = self
            .decisions
            .decisions()
            .into_iter()
            .map(|(index, decision)| VoteRecord {
                index,
                decision,
                note: self.decisions.note(index).map(str::to_string),
            })
            .collect::<Vec<_>>();
        ReviewSubmission {
            vod_url: self.source_url.clone(),
            total_segments: summary.total,
            review_index: votes.len(),
            votes,
        }
    }

    /// Persist decisions; returns whether the backend accepted them
    pub async fn save(&mut self, sink: &dyn DecisionSink) -> bool {
        let submission = self.export_votes();
        match sink.save_review(&submission).await {
            Ok(state) => {
                info!(session_id = %self.session_id, votes = submission.votes.len(), "Review saved");
                self.status.saved_at = state.updated_at;
                self.status.error = None;
                self.events.emit_lossy(VtpEvent::ReviewSaved {
                    session_id: self.session_id,
                    source_url: self.source_url.clone(),
                    votes: submission.votes.len(),
                    timestamp: Utc::now(),
                });
                true
            }
            Err(e) => {
                warn!(error = %e, "Review save failed");
                self.status.error = Some(e.to_string());
                false
            }
        }
    }

    /// Replace decisions with the backend's saved ones
    ///
    /// Returns whether saved votes were found and applied.
    pub async fn restore_saved(&mut self, sink: &dyn DecisionSink) -> bool {
        let state = match sink.load_review(&self.source_url).await {
            Ok(Some(state)) => state,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Loading saved review failed");
                self.status.error = Some(e.to_string());
                return false;
            }
        };

        let (accepted, rejected): (Vec<_>, Vec<_>) = state
            .votes
            .iter()
            .partition(|vote| vote.decision == Decision::Accept);
        self.decisions.load_persisted(
            state
                .votes
                .iter()
                .map(|vote| (vote.index, vote.decision, vote.note.clone())),
        );
        self.status.saved_at = state.updated_at.clone();
        info!(session_id = %self.session_id, votes = state.votes.len(), "Saved review restored");

        for (votes, decision) in [(accepted, Decision::Accept), (rejected, Decision::Reject)] {
            if !votes.is_empty() {
                self.emit_decisions(votes.iter().map(|vote| vote.index).collect(), Some(decision));
            }
        }
        true
    }

    /// Settings correction once review is complete
    ///
    /// Only offered when nothing is left to review, so a partly reviewed
    /// catalog never reads as degenerate.
    pub fn suggestion(&self, current: &SanitizeSettings) -> Option<Suggestion> {
        let summary = self.summary();
        if summary.remaining > 0 {
            return None;
        }
        suggest_correction(summary.accepted, summary.total, current)
    }

    // ---- internals ----

    fn sync_view(&mut self) {
        let Some(old_view) = self.view.refresh(&self.catalog, &self.decisions) else {
            return;
        };
        let new_view = self.view.indices();
        self.window.set_count(new_view.len());
        let next = reconcile(&old_view, new_view, self.active);
        self.select(next);
    }

    fn select(&mut self, index: Option<u32>) {
        if index == self.active {
            return;
        }
        self.active = index;
        self.events.emit_lossy(VtpEvent::SelectionChanged {
            session_id: self.session_id,
            index,
            timestamp: Utc::now(),
        });
    }

    fn navigate(&mut self, target: Option<u32>) -> Option<u32> {
        if let Some(index) = target {
            if let Some(position) = self.view.indices().iter().position(|i| *i == index) {
                self.window.ensure_visible(position);
            }
        }
        self.select(target);
        target
    }

    fn decide_active(&mut self, decision: Decision) -> Option<u32> {
        let index = self.active()?;
        self.decide(index, decision)?;
        Some(index)
    }

    fn apply_batch(&mut self, targets: Vec<u32>, decision: Decision) -> Vec<u32> {
        let applied = self.decisions.batch_apply(targets, decision);
        if !applied.is_empty() {
            self.emit_decisions(applied.clone(), Some(decision));
        }
        applied
    }

    fn emit_decisions(&self, indices: Vec<u32>, decision: Option<Decision>) {
        self.events.emit_lossy(VtpEvent::DecisionsChanged {
            session_id: self.session_id,
            indices,
            decision,
            timestamp: Utc::now(),
        });
    }

    fn update_prefs<F>(&mut self, change: F)
    where
        F: FnOnce(&mut ViewPreferences),
    {
        if self.prefs.update(change) {
            self.window
                .set_density(RowDensity::from_preferences(&self.prefs.get()));
        }
    }

    fn notify(&mut self, message: String) {
        info!(%message, "Review notice");
        self.events.emit_lossy(VtpEvent::Notice {
            message: message.clone(),
            timestamp: Utc::now(),
        });
        self.status.notice = Some(message);
    }
}
