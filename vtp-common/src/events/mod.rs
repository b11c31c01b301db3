//! Event types for the VTP event system
//!
//! Provides shared event definitions and the EventBus observers subscribe to.
//! Every engine mutation that observers care about is announced here once,
//! after the mutation has fully applied.

// Sub-modules (supporting types)
mod pipeline_types;
mod review_types;

pub use pipeline_types::{StageId, StageStatus};
pub use review_types::{Decision, TrackSource};

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

/// VTP event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so they
/// can be forwarded verbatim to a UI or a log sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VtpEvent {
    /// One or more decisions changed
    ///
    /// A batch operation emits exactly one of these for all its indices.
    DecisionsChanged {
        /// Review session that owns the decisions
        session_id: Uuid,
        /// Affected segment indices
        indices: Vec<u32>,
        /// New decision, `None` when the segments returned to pending
        decision: Option<Decision>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A catalog page replaced the previous one
    CatalogLoaded {
        session_id: Uuid,
        offset: usize,
        limit: usize,
        total: usize,
        /// Segments in the page
        count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Active segment changed
    SelectionChanged {
        session_id: Uuid,
        /// New active index, `None` when nothing is pending
        index: Option<u32>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Review decisions persisted by the backend
    ReviewSaved {
        session_id: Uuid,
        source_url: String,
        votes: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pipeline stage moved between statuses
    StageStatusChanged {
        stage: StageId,
        old_status: StageStatus,
        new_status: StageStatus,
        message: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Stage progress override changed (0-100)
    StageProgress {
        stage: StageId,
        percent: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Stage log line appended
    StageLog {
        stage: StageId,
        line: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Bounded segment playback began
    PlaybackStarted {
        source: TrackSource,
        index: u32,
        /// Seek target (seconds)
        start: f64,
        /// Auto-stop position (seconds)
        end: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback halted, either at the segment end or by request
    PlaybackStopped {
        source: TrackSource,
        position: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transient user-facing notice (fallbacks, automatic mode changes)
    Notice {
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A persisted job differs from the session; continue or start over
    ResumeDecisionRequired {
        job_id: String,
        source_url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job record created, merged or purged on the backend
    JobUpdated {
        job_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl VtpEvent {
    /// Event type name, identical to the serialized `type` tag
    pub fn event_type(&self) -> &'static str {
        match self {
            VtpEvent::DecisionsChanged { .. } => "DecisionsChanged",
            VtpEvent::CatalogLoaded { .. } => "CatalogLoaded",
            VtpEvent::SelectionChanged { .. } => "SelectionChanged",
            VtpEvent::ReviewSaved { .. } => "ReviewSaved",
            VtpEvent::StageStatusChanged { .. } => "StageStatusChanged",
            VtpEvent::StageProgress { .. } => "StageProgress",
            VtpEvent::StageLog { .. } => "StageLog",
            VtpEvent::PlaybackStarted { .. } => "PlaybackStarted",
            VtpEvent::PlaybackStopped { .. } => "PlaybackStopped",
            VtpEvent::Notice { .. } => "Notice",
            VtpEvent::ResumeDecisionRequired { .. } => "ResumeDecisionRequired",
            VtpEvent::JobUpdated { .. } => "JobUpdated",
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central event distribution bus
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use vtp_common::events::{EventBus, VtpEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(VtpEvent::Notice {
///     message: "Performance mode enabled".to_string(),
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert!(matches!(rx.try_recv(), Ok(VtpEvent::Notice { .. })));
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VtpEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Capacity is the number of events buffered per subscriber before the
    /// oldest are dropped. 100 is plenty for tests; a busy stage log wants ~1000.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<VtpEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: VtpEvent) -> Result<usize, broadcast::error::SendError<VtpEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VtpEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe as a stream
    ///
    /// Lagged receivers log a warning and keep going; the stream ends when
    /// the bus is dropped.
    pub fn stream(&self) -> impl Stream<Item = VtpEvent> {
        let mut rx = self.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event stream lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
