//! Windowed list rendering math
//!
//! Given N fixed-height rows, a viewport and a scroll offset, only the rows
//! near the viewport are materialized; spacers stand in for the rest so the
//! scroll extent stays `N * row_height`.

use vtp_common::config::ViewPreferences;

/// Rows materialized beyond each viewport edge
pub const OVERSCAN: usize = 6;

/// Viewport height assumed before the real one is known
pub const DEFAULT_VIEWPORT_HEIGHT: f64 = 520.0;

/// Row layout, each with a fixed height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDensity {
    Performance,
    Compact,
    Full,
}

impl RowDensity {
    /// Performance mode wins over compact
    pub fn from_preferences(prefs: &ViewPreferences) -> Self {
        if prefs.perf_mode {
            RowDensity::Performance
        } else if prefs.compact {
            RowDensity::Compact
        } else {
            RowDensity::Full
        }
    }

    pub fn row_height(self) -> f64 {
        match self {
            RowDensity::Performance => 130.0,
            RowDensity::Compact => 150.0,
            RowDensity::Full => 210.0,
        }
    }
}

/// Rows to materialize plus spacer sizes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowRange {
    /// First materialized row (inclusive)
    pub start: usize,
    /// Last materialized row (exclusive)
    pub end: usize,
    pub top_spacer: f64,
    pub bottom_spacer: f64,
}

impl WindowRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// Compute the materialized range
///
/// `start = max(0, floor(s/h) - k)`, `end = min(N, ceil((s+H)/h) + k)`.
/// A scroll offset past the content yields an empty range at the end rather
/// than `start > end`.
pub fn compute_window(
    count: usize,
    row_height: f64,
    viewport_height: f64,
    scroll_offset: f64,
    overscan: usize,
) -> WindowRange {
    if count == 0 {
        return WindowRange {
            start: 0,
            end: 0,
            top_spacer: 0.0,
            bottom_spacer: 0.0,
        };
    }
    if row_height.is_nan() || row_height <= 0.0 {
        return WindowRange {
            start: 0,
            end: count,
            top_spacer: 0.0,
            bottom_spacer: 0.0,
        };
    }

    let scroll = scroll_offset.max(0.0);
    let viewport = viewport_height.max(0.0);

    let first_visible = (scroll / row_height).floor() as usize;
    let last_visible = ((scroll + viewport) / row_height).ceil() as usize;

    let end = last_visible.saturating_add(overscan).min(count);
    let start = first_visible.saturating_sub(overscan).min(end);

    // Bottom spacer absorbs rounding so the extent is exactly N * h
    let top_spacer = start as f64 * row_height;
    let filled = top_spacer + (end - start) as f64 * row_height;
    WindowRange {
        start,
        end,
        top_spacer,
        bottom_spacer: (count as f64 * row_height - filled).max(0.0),
    }
}

/// Coalesces scroll notifications to one read per animation frame
///
/// The first scroll after a frame schedules a frame; later scrolls in the
/// same frame only replace the pending offset.
#[derive(Debug, Default)]
pub struct ScrollThrottle {
    pending: Option<f64>,
}

impl ScrollThrottle {
    /// Record a scroll; returns `true` when a frame must be scheduled
    pub fn on_scroll(&mut self, offset: f64) -> bool {
        let schedule = self.pending.is_none();
        self.pending = Some(offset);
        schedule
    }

    /// Frame callback: the offset to commit, if any scroll happened
    pub fn on_frame(&mut self) -> Option<f64> {
        self.pending.take()
    }
}

/// Scroll state for one list
#[derive(Debug)]
pub struct WindowedList {
    count: usize,
    density: RowDensity,
    viewport_height: f64,
    scroll_offset: f64,
    throttle: ScrollThrottle,
}

impl WindowedList {
    pub fn new(density: RowDensity) -> Self {
        Self {
            count: 0,
            density,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_offset: 0.0,
            throttle: ScrollThrottle::default(),
        }
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn set_density(&mut self, density: RowDensity) {
        self.density = density;
        self.scroll_offset = self.scroll_offset.min(self.max_scroll());
    }

    pub fn density(&self) -> RowDensity {
        self.density
    }

    /// Zero or negative heights (unmeasured viewport) use the default
    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = if height > 0.0 {
            height
        } else {
            DEFAULT_VIEWPORT_HEIGHT
        };
    }

    pub fn on_scroll(&mut self, offset: f64) -> bool {
        self.throttle.on_scroll(offset)
    }

    /// Commit the throttled scroll offset; returns whether it changed
    pub fn on_frame(&mut self) -> bool {
        match self.throttle.on_frame() {
            Some(offset) => {
                let offset = offset.clamp(0.0, self.max_scroll());
                let changed = offset != self.scroll_offset;
                self.scroll_offset = offset;
                changed
            }
            None => false,
        }
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    /// Scroll the minimum needed to show `position` fully
    pub fn ensure_visible(&mut self, position: usize) {
        let h = self.density.row_height();
        let top = position as f64 * h;
        let bottom = top + h;
        if top < self.scroll_offset {
            self.scroll_offset = top;
        } else if bottom > self.scroll_offset + self.viewport_height {
            self.scroll_offset = (bottom - self.viewport_height).max(0.0);
        }
    }

    pub fn range(&self) -> WindowRange {
        compute_window(
            self.count,
            self.density.row_height(),
            self.viewport_height,
            self.scroll_offset,
            OVERSCAN,
        )
    }

    fn max_scroll(&self) -> f64 {
        (self.count as f64 * self.density.row_height() - self.viewport_height).max(0.0)
    }
}
