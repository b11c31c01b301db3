//! Elapsed-time progress estimate for single-response stages
//!
//! A stage that answers with one terminal response gives no progress signal
//! while it works. Progress is estimated from elapsed time against an
//! expected duration and held below [`ESTIMATE_CAP`] until the response
//! arrives.

use std::time::Duration;
use vtp_common::events::StageId;

/// Highest estimated percentage before the real result lands
pub const ESTIMATE_CAP: u8 = 95;

/// How often the runner refreshes the estimate
pub const ESTIMATE_TICK: Duration = Duration::from_millis(500);

const EXTRACT_EXPECTED: Duration = Duration::from_secs(120);

/// Expected run time of a stage, when one is known
pub fn expected_duration(stage: StageId) -> Option<Duration> {
    match stage {
        StageId::Extract => Some(EXTRACT_EXPECTED),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ElapsedEstimator {
    expected: Duration,
}

impl ElapsedEstimator {
    pub fn new(expected: Duration) -> Self {
        Self { expected }
    }

    /// Estimator for a stage with a known expected duration
    pub fn for_stage(stage: StageId) -> Option<Self> {
        expected_duration(stage).map(Self::new)
    }

    /// Estimated percentage after `elapsed`, capped at [`ESTIMATE_CAP`]
    pub fn percent_at(&self, elapsed: Duration) -> u8 {
        if self.expected.is_zero() {
            return ESTIMATE_CAP;
        }
        let ratio = elapsed.as_secs_f64() / self.expected.as_secs_f64();
        let percent = (ratio * 100.0).floor().min(f64::from(ESTIMATE_CAP));
        percent.max(0.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_extract_has_an_estimate() {
        assert!(ElapsedEstimator::for_stage(StageId::Extract).is_some());
        assert!(ElapsedEstimator::for_stage(StageId::Transcribe).is_none());
    }

    #[test]
    fn test_percent_grows_then_caps() {
        let estimator = ElapsedEstimator::new(Duration::from_secs(120));
        assert_eq!(estimator.percent_at(Duration::ZERO), 0);
        assert_eq!(estimator.percent_at(Duration::from_secs(60)), 50);
        assert_eq!(estimator.percent_at(Duration::from_secs(119)), 95);
        assert_eq!(estimator.percent_at(Duration::from_secs(600)), 95);
    }
}
