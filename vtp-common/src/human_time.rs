//! Human-readable time formatting
//!
//! Segment positions and stage durations share one display convention:
//! - Under a minute: `S.Ss`
//! - Under an hour: `M:SS.S`
//! - Otherwise: `H:MM:SS`

const MINUTE: f64 = 60.0;
const HOUR: f64 = 3600.0;

/// Format a position or duration given in seconds
///
/// Negative and non-finite values are clamped to zero.
///
/// # Examples
///
/// ```
/// use vtp_common::human_time::format_seconds;
///
/// assert_eq!(format_seconds(4.25), "4.3s");
/// assert_eq!(format_seconds(75.0), "1:15.0");
/// assert_eq!(format_seconds(3723.0), "1:02:03");
/// ```
pub fn format_seconds(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    // Round to the displayed precision first so 59.96 becomes 1:00.0, not 60.0s
    let seconds = (seconds * 10.0).round() / 10.0;

    if seconds < MINUTE {
        format!("{:.1}s", seconds)
    } else if seconds < HOUR {
        let minutes = (seconds / MINUTE).floor();
        let rest = seconds - minutes * MINUTE;
        format!("{}:{:04.1}", minutes as u64, rest)
    } else {
        let total = seconds.round() as u64;
        format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    }
}

/// Format a segment span as `start - end (duration)`
pub fn format_span(start: f64, end: f64) -> String {
    format!(
        "{} - {} ({})",
        format_seconds(start),
        format_seconds(end),
        format_seconds(end - start)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_format() {
        assert_eq!(format_seconds(0.0), "0.0s");
        assert_eq!(format_seconds(59.94), "59.9s");
        assert_eq!(format_seconds(59.96), "1:00.0");
    }

    #[test]
    fn test_medium_format_pads_seconds() {
        assert_eq!(format_seconds(61.5), "1:01.5");
        assert_eq!(format_seconds(600.0), "10:00.0");
    }

    #[test]
    fn test_long_format() {
        assert_eq!(format_seconds(7200.0), "2:00:00");
    }

    #[test]
    fn test_invalid_values_clamp_to_zero() {
        assert_eq!(format_seconds(-3.0), "0.0s");
        assert_eq!(format_seconds(f64::NAN), "0.0s");
    }

    #[test]
    fn test_span() {
        assert_eq!(format_span(1.0, 3.5), "1.0s - 3.5s (2.5s)");
    }
}
