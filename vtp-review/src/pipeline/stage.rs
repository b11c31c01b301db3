//! Per-stage state: status, bounded log, progress and output

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use vtp_common::events::{StageId, StageStatus};

/// Log lines retained per stage; oldest dropped first
pub const MAX_LOG_LINES: usize = 600;

#[derive(Debug, Clone, Serialize)]
pub struct StageState {
    pub stage: StageId,
    pub status: StageStatus,
    /// Failure or cancellation message
    pub message: Option<String>,
    log: VecDeque<String>,
    /// Progress override, 0..=100
    pub progress: Option<u8>,
    pub output_path: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageState {
    pub fn new(stage: StageId, status: StageStatus) -> Self {
        Self {
            stage,
            status,
            message: None,
            log: VecDeque::new(),
            progress: None,
            output_path: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Append one line, evicting the oldest beyond [`MAX_LOG_LINES`]
    pub fn append_log(&mut self, line: impl Into<String>) {
        self.log.push_back(line.into());
        while self.log.len() > MAX_LOG_LINES {
            self.log.pop_front();
        }
    }

    pub fn extend_log<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            self.append_log(line);
        }
    }

    pub fn log(&self) -> impl Iterator<Item = &str> {
        self.log.iter().map(String::as_str)
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Last `n` log lines, oldest first
    pub fn log_tail(&self, n: usize) -> Vec<&str> {
        let skip = self.log.len().saturating_sub(n);
        self.log.iter().skip(skip).map(String::as_str).collect()
    }

    pub(crate) fn clear_run(&mut self) {
        self.message = None;
        self.log.clear();
        self.progress = None;
        self.output_path = None;
        self.started_at = None;
        self.finished_at = None;
    }

    /// Contribution to overall progress, 0..=1
    ///
    /// Done counts fully; running counts its override (0 without one);
    /// every other status counts nothing.
    pub fn completion_fraction(&self) -> f64 {
        match self.status {
            StageStatus::Done => 1.0,
            StageStatus::Running => f64::from(self.progress.unwrap_or(0)) / 100.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded_and_drops_oldest() {
        let mut state = StageState::new(StageId::Sanitize, StageStatus::Running);
        for i in 0..MAX_LOG_LINES + 25 {
            state.append_log(format!("line {}", i));
        }
        assert_eq!(state.log_len(), MAX_LOG_LINES);
        assert_eq!(state.log().next(), Some("line 25"));
        assert_eq!(state.log_tail(1), vec![format!("line {}", MAX_LOG_LINES + 24)]);
    }

    #[test]
    fn test_completion_fraction_by_status() {
        let mut state = StageState::new(StageId::Extract, StageStatus::Running);
        assert_eq!(state.completion_fraction(), 0.0);
        state.progress = Some(40);
        assert!((state.completion_fraction() - 0.4).abs() < 1e-9);
        state.status = StageStatus::Error;
        assert_eq!(state.completion_fraction(), 0.0);
        state.status = StageStatus::Done;
        assert_eq!(state.completion_fraction(), 1.0);
    }
}
