//! Advisory settings corrections for degenerate sanitize runs

use super::settings::{SanitizePreset, SanitizeSettings};
use serde::Serialize;

/// Accepted fraction below which a moderate correction is proposed
pub const FEW_RETAINED_FRACTION: f64 = 0.2;

/// Failure messages that mean the run kept nothing
const NOTHING_RETAINED_MARKERS: [&str; 2] = ["no speech retained", "no segments"];

/// Strictness proposed after a sanitize run failed for lack of speech
pub const STAGE_FAILURE_STRICTNESS: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SuggestionReason {
    /// Nothing was accepted
    NoneRetained,
    /// Some, but under the threshold, were accepted
    FewRetained { accepted_fraction: f64 },
    /// The sanitize stage itself reported an empty result
    StageFailure,
}

/// Proposed settings change; never applied automatically
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub reason: SuggestionReason,
    pub settings: SanitizeSettings,
    pub message: String,
}

/// Most permissive settings, keeping the caller's detection mode
fn permissive(current: &SanitizeSettings) -> SanitizeSettings {
    SanitizeSettings {
        mode: current.mode,
        preset: SanitizePreset::Lenient,
        strictness: 0.3,
        extract_vocals: false,
    }
}

/// One preset step looser with strictness lowered by 0.2, floored at 0.3
fn moderate(current: &SanitizeSettings) -> SanitizeSettings {
    SanitizeSettings {
        preset: current.preset.looser(),
        strictness: (current.strictness - 0.2).max(0.3).min(current.strictness),
        ..*current
    }
}

/// Propose a correction from the review outcome
///
/// `total == 0` means the run produced no segments at all and counts as a
/// zero accepted fraction. Returns `None` when the run looks healthy or the
/// proposal would not loosen anything.
pub fn suggest_correction(accepted: usize, total: usize, current: &SanitizeSettings) -> Option<Suggestion> {
    let fraction = if total == 0 {
        0.0
    } else {
        accepted as f64 / total as f64
    };

    let (reason, settings) = if accepted == 0 {
        (SuggestionReason::NoneRetained, permissive(current))
    } else if fraction < FEW_RETAINED_FRACTION {
        (
            SuggestionReason::FewRetained {
                accepted_fraction: fraction,
            },
            moderate(current),
        )
    } else {
        return None;
    };

    if !settings.is_looser_than(current) {
        return None;
    }

    let message = match reason {
        SuggestionReason::NoneRetained => {
            "No segments were kept. Try the lenient preset with lower strictness.".to_string()
        }
        _ => format!(
            "Only {:.0}% of segments were kept. Try a looser preset.",
            fraction * 100.0
        ),
    };

    Some(Suggestion {
        reason,
        settings,
        message,
    })
}

/// Propose a correction when a sanitize run failed for lack of speech
pub fn suggest_from_stage_failure(message: &str, current: &SanitizeSettings) -> Option<Suggestion> {
    let lowered = message.to_lowercase();
    if !NOTHING_RETAINED_MARKERS.iter().any(|m| lowered.contains(m)) {
        return None;
    }

    // Lenient at 0.4, never raising a strictness that is already lower
    let settings = SanitizeSettings {
        strictness: current.strictness.min(STAGE_FAILURE_STRICTNESS),
        ..permissive(current)
    };
    if !settings.is_looser_than(current) {
        return None;
    }

    Some(Suggestion {
        reason: SuggestionReason::StageFailure,
        settings,
        message: "Sanitize kept no speech. Retry with the lenient preset and vocal extraction off."
            .to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::settings::SanitizeProfile;

    #[test]
    fn test_zero_accepted_proposes_most_permissive() {
        let current = SanitizeSettings::from_profile(SanitizeProfile::Strict);
        let suggestion = suggest_correction(0, 120, &current).unwrap();
        assert_eq!(suggestion.reason, SuggestionReason::NoneRetained);
        assert_eq!(suggestion.settings.preset, SanitizePreset::Lenient);
        assert_eq!(suggestion.settings.strictness, 0.3);
        assert!(!suggestion.settings.extract_vocals);
    }

    #[test]
    fn test_empty_run_counts_as_zero_fraction() {
        let suggestion = suggest_correction(0, 0, &SanitizeSettings::default()).unwrap();
        assert_eq!(suggestion.reason, SuggestionReason::NoneRetained);
    }

    #[test]
    fn test_few_accepted_proposes_one_step_looser() {
        let current = SanitizeSettings::from_profile(SanitizeProfile::Strict);
        let suggestion = suggest_correction(10, 100, &current).unwrap();
        assert!(matches!(suggestion.reason, SuggestionReason::FewRetained { .. }));
        assert_eq!(suggestion.settings.preset, SanitizePreset::Balanced);
        assert!((suggestion.settings.strictness - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_healthy_run_gets_nothing() {
        assert!(suggest_correction(20, 100, &SanitizeSettings::default()).is_none());
    }

    #[test]
    fn test_already_permissive_gets_nothing() {
        let current = SanitizeSettings::from_profile(SanitizeProfile::Rapid);
        assert!(suggest_correction(0, 50, &current).is_none());
    }

    #[test]
    fn test_failure_message_detection() {
        let current = SanitizeSettings::default();
        assert!(suggest_from_stage_failure("Sanitize failed: No speech retained after gating", &current).is_some());
        assert!(suggest_from_stage_failure("pipeline produced no segments", &current).is_some());
        assert!(suggest_from_stage_failure("ffmpeg exited with code 1", &current).is_none());
    }

    #[test]
    fn test_failure_suggestion_settings() {
        let strict = SanitizeSettings {
            extract_vocals: true,
            ..SanitizeSettings::from_profile(SanitizeProfile::Strict)
        };
        let suggestion = suggest_from_stage_failure("No speech retained", &strict).unwrap();
        assert_eq!(suggestion.reason, SuggestionReason::StageFailure);
        assert_eq!(suggestion.settings.preset, SanitizePreset::Lenient);
        assert_eq!(suggestion.settings.strictness, STAGE_FAILURE_STRICTNESS);
        assert!(!suggestion.settings.extract_vocals);

        // Already below 0.4: strictness is kept, vocals still switched off
        let rapid_with_vocals = SanitizeSettings {
            extract_vocals: true,
            ..SanitizeSettings::from_profile(SanitizeProfile::Rapid)
        };
        let suggestion = suggest_from_stage_failure("no segments", &rapid_with_vocals).unwrap();
        assert_eq!(suggestion.settings.strictness, 0.3);
        assert!(!suggestion.settings.extract_vocals);

        let rapid = SanitizeSettings::from_profile(SanitizeProfile::Rapid);
        assert!(suggest_from_stage_failure("no segments", &rapid).is_none());
    }
}
