//! Segment review
//!
//! Leaf components (decision store, catalog, projections, selection, list
//! window) hold no I/O; [`ReviewSession`] composes them for one source URL.

pub mod catalog;
pub mod decisions;
pub mod projection;
pub mod selection;
pub mod session;
pub mod window;

pub use catalog::{LoadTicket, PageInfo, SegmentCatalog};
pub use decisions::{DecisionCounts, DecisionStore, HistoryEntry, UndoOutcome};
pub use projection::{DeferredView, SegmentFilter, SortOrder, ViewQuery};
pub use session::{ReviewSession, ReviewStatus, ReviewSummary, VisibleRows};
pub use window::{compute_window, RowDensity, WindowRange, WindowedList};
