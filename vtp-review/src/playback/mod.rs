//! Bounded segment playback
//!
//! A [`PlaybackSynchronizer`] owns one audio element and plays segment-sized
//! slices of either the clean or the original track through it. The element
//! is abstract: anything that can load a URL, seek, play and report its
//! position implements [`AudioElement`].

mod synchronizer;

pub use synchronizer::{
    PendingAction, PlaybackSynchronizer, SegmentBounds, TrackUrls, CLEAN_FALLBACK_NOTICE, NOTICE_TTL,
};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Default position check period
pub const POSITION_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Media element driven by the synchronizer
///
/// `set_source` starts an asynchronous load; the element reports readiness
/// through [`AudioElement::is_ready`] and the host forwards the load signal
/// to [`PlaybackSynchronizer::on_source_loaded`].
pub trait AudioElement: Send {
    /// URL currently loaded or loading
    fn source(&self) -> Option<&str>;

    fn set_source(&mut self, url: &str);

    /// Whether the current source finished loading
    fn is_ready(&self) -> bool;

    fn seek(&mut self, position: f64);

    fn play(&mut self);

    fn pause(&mut self);

    /// Playhead position (seconds)
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;
}

/// Periodic end-of-segment check
///
/// Runs until `cancel` fires, halting playback whenever the playhead passes
/// the segment end.
pub async fn run_position_watch<E: AudioElement>(
    synchronizer: Arc<Mutex<PlaybackSynchronizer<E>>>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(interval_ms = every.as_millis() as u64, "Position watch started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                if synchronizer.lock().await.on_time_update() {
                    debug!("Segment end reached");
                }
            }
        }
    }

    info!("Position watch stopped");
}
