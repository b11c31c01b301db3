//! Segment playback over one audio element
//!
//! Playing a segment from a track the element has not loaded swaps the
//! source first and queues the play; the queued action runs once, on the
//! load signal of the new source. Only the most recent queued action
//! survives.

use super::AudioElement;
use crate::models::Segment;
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use vtp_common::events::{EventBus, TrackSource, VtpEvent};

/// How long a notice stays visible
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

pub const CLEAN_FALLBACK_NOTICE: &str = "Clean audio unavailable (segment rejected) - playing original";

/// Scrub span floor for zero-length segments (seconds)
const MIN_SCRUB_SPAN: f64 = 0.01;

/// Artifact URLs of the two tracks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackUrls {
    pub clean: Option<String>,
    pub original: Option<String>,
}

impl TrackUrls {
    pub fn get(&self, source: TrackSource) -> Option<&str> {
        match source {
            TrackSource::Clean => self.clean.as_deref(),
            TrackSource::Original => self.original.as_deref(),
        }
    }
}

/// Segment slice on a specific track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentBounds {
    pub index: u32,
    pub source: TrackSource,
    pub start: f64,
    pub end: f64,
}

impl SegmentBounds {
    pub fn of(segment: &Segment, source: TrackSource) -> Self {
        let (start, end) = segment.bounds(source);
        Self {
            index: segment.index,
            source,
            start,
            end,
        }
    }

    fn span(&self) -> f64 {
        (self.end - self.start).max(MIN_SCRUB_SPAN)
    }
}

/// Action waiting for the element to become ready
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingAction {
    /// Bounded playback
    Play(SegmentBounds),
    /// Move the playhead to the segment start without playing
    Park(SegmentBounds),
    /// Move the playhead to an absolute position
    Seek(f64),
}

pub struct PlaybackSynchronizer<E: AudioElement> {
    element: E,
    urls: TrackUrls,
    /// Track the element holds
    source: Option<TrackSource>,
    /// Segment the playhead belongs to
    active: Option<SegmentBounds>,
    /// Auto-stop position of the current bounded playback
    playback_end: Option<f64>,
    pending: Option<PendingAction>,
    notice: Option<(String, Instant)>,
    events: Option<EventBus>,
}

impl<E: AudioElement> PlaybackSynchronizer<E> {
    pub fn new(element: E) -> Self {
        Self {
            element,
            urls: TrackUrls::default(),
            source: None,
            active: None,
            playback_end: None,
            pending: None,
            notice: None,
            events: None,
        }
    }

    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    pub fn element_mut(&mut self) -> &mut E {
        &mut self.element
    }

    /// Point the synchronizer at a new pair of tracks
    ///
    /// Stops playback and drops the loaded source and any queued action.
    pub fn set_tracks(&mut self, urls: TrackUrls) {
        if urls == self.urls {
            return;
        }
        self.stop();
        self.urls = urls;
        self.source = None;
        self.active = None;
        self.pending = None;
    }

    pub fn source(&self) -> Option<TrackSource> {
        self.source
    }

    pub fn active(&self) -> Option<SegmentBounds> {
        self.active
    }

    pub fn playback_end(&self) -> Option<f64> {
        self.playback_end
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    pub fn is_playing(&self) -> bool {
        self.element.is_playing()
    }

    /// Current notice, until it expires
    pub fn notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|(_, at)| at.elapsed() < NOTICE_TTL)
            .map(|(message, _)| message.as_str())
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Play a segment, substituting the original track when the segment has
    /// no clean slice
    ///
    /// Returns the track actually used.
    pub fn request_play(&mut self, segment: &Segment, source: TrackSource) -> TrackSource {
        let source = self.resolve_source(segment, source, true);
        self.play_segment(segment, source);
        source
    }

    /// Play `segment` from `source`, stopping at its end
    pub fn play_segment(&mut self, segment: &Segment, source: TrackSource) {
        let bounds = SegmentBounds::of(segment, source);
        self.stop();
        self.active = Some(bounds);
        self.dispatch(source, PendingAction::Play(bounds));
    }

    /// Make `segment` active and park the playhead at its start
    pub fn select_segment(&mut self, segment: &Segment) {
        let preferred = self.source.unwrap_or(TrackSource::Clean);
        let source = self.resolve_source(segment, preferred, false);
        let bounds = SegmentBounds::of(segment, source);
        self.stop();
        self.active = Some(bounds);
        self.dispatch(source, PendingAction::Park(bounds));
    }

    /// Load `target` and run `action` once it is ready
    ///
    /// A later call before the load finishes replaces the queued action.
    pub fn switch_source(&mut self, target: TrackSource, action: PendingAction) {
        let Some(url) = self.urls.get(target).map(str::to_string) else {
            warn!(source = %target, "No track available for source");
            self.set_notice(format!("No {} track available", target));
            return;
        };

        self.element.pause();
        self.source = Some(target);
        if self.element.source() == Some(url.as_str()) && self.element.is_ready() {
            // Both tracks share one URL; no load signal will follow.
            self.pending = None;
            self.perform(action);
            return;
        }
        if self.element.source() != Some(url.as_str()) {
            debug!(source = %target, %url, "Switching audio source");
            self.element.set_source(&url);
        }
        if let Some(replaced) = self.pending.replace(action) {
            debug!(?replaced, "Queued playback action replaced");
        }
    }

    /// Load signal from the element
    ///
    /// Runs the queued action once. Signals for a source that has since been
    /// replaced are ignored.
    pub fn on_source_loaded(&mut self, url: &str) {
        if self.element.source() != Some(url) {
            debug!(%url, "Ignoring load signal for a replaced source");
            return;
        }
        if let Some(action) = self.pending.take() {
            self.perform(action);
        }
    }

    /// Position check; halts playback at the segment end
    ///
    /// Returns whether playback was halted.
    pub fn on_time_update(&mut self) -> bool {
        let Some(end) = self.playback_end else {
            return false;
        };
        if !self.element.is_playing() || self.element.position() < end {
            return false;
        }
        self.element.pause();
        self.playback_end = None;
        self.emit_stopped();
        true
    }

    /// Seek within the active segment; `fraction` is clamped to 0..=1
    pub fn scrub_to_fraction(&mut self, fraction: f64) {
        let Some(bounds) = self.active else {
            return;
        };
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let target = bounds.start + fraction * bounds.span();

        if self.is_settled(bounds.source) {
            self.element.seek(target);
        } else {
            self.dispatch(bounds.source, PendingAction::Seek(target));
        }
    }

    /// Play/pause the active segment
    ///
    /// Resumes from the playhead when it is inside the segment, otherwise
    /// from the segment start.
    pub fn toggle(&mut self) {
        if self.element.is_playing() {
            self.stop();
            return;
        }
        let Some(mut bounds) = self.active else {
            return;
        };
        if self.is_settled(bounds.source) {
            let position = self.element.position();
            if position >= bounds.start && position < bounds.end {
                bounds.start = position;
            }
        }
        self.dispatch(bounds.source, PendingAction::Play(bounds));
    }

    /// Halt playback and forget the stop time
    pub fn stop(&mut self) {
        let was_playing = self.element.is_playing();
        self.element.pause();
        self.playback_end = None;
        if was_playing {
            self.emit_stopped();
        }
    }

    /// Playhead position within the active segment, 0..=1
    pub fn progress_fraction(&self) -> f64 {
        let Some(bounds) = self.active else {
            return 0.0;
        };
        ((self.element.position() - bounds.start) / bounds.span()).clamp(0.0, 1.0)
    }

    fn resolve_source(&mut self, segment: &Segment, requested: TrackSource, announce: bool) -> TrackSource {
        if requested == TrackSource::Clean && segment.clean_bounds().is_none() {
            if announce {
                info!(index = segment.index, "Clean slice missing; playing original");
                self.set_notice(CLEAN_FALLBACK_NOTICE.to_string());
            }
            return TrackSource::Original;
        }
        requested
    }

    // Source loaded and nothing queued ahead of us.
    fn is_settled(&self, source: TrackSource) -> bool {
        self.source == Some(source) && self.element.is_ready() && self.pending.is_none()
    }

    fn dispatch(&mut self, source: TrackSource, action: PendingAction) {
        if self.source != Some(source) {
            self.switch_source(source, action);
        } else if !self.element.is_ready() {
            self.pending = Some(action);
        } else {
            self.pending = None;
            self.perform(action);
        }
    }

    fn perform(&mut self, action: PendingAction) {
        match action {
            PendingAction::Play(bounds) => {
                self.element.seek(bounds.start);
                self.element.play();
                self.playback_end = Some(bounds.end);
                debug!(index = bounds.index, start = bounds.start, end = bounds.end, "Segment playback started");
                self.emit(VtpEvent::PlaybackStarted {
                    source: bounds.source,
                    index: bounds.index,
                    start: bounds.start,
                    end: bounds.end,
                    timestamp: Utc::now(),
                });
            }
            PendingAction::Park(bounds) => {
                self.element.seek(bounds.start);
            }
            PendingAction::Seek(position) => {
                self.element.seek(position);
            }
        }
    }

    fn set_notice(&mut self, message: String) {
        self.emit(VtpEvent::Notice {
            message: message.clone(),
            timestamp: Utc::now(),
        });
        self.notice = Some((message, Instant::now()));
    }

    fn emit_stopped(&self) {
        if let Some(source) = self.source {
            self.emit(VtpEvent::PlaybackStopped {
                source,
                position: self.element.position(),
                timestamp: Utc::now(),
            });
        }
    }

    fn emit(&self, event: VtpEvent) {
        if let Some(events) = &self.events {
            events.emit_lossy(event);
        }
    }
}
