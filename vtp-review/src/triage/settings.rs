//! Sanitize stage parameters

use serde::{Deserialize, Serialize};

/// Detection mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeMode {
    #[default]
    Auto,
    Voice,
}

/// Backend preset, strictest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizePreset {
    Strict,
    #[default]
    Balanced,
    Lenient,
}

impl SanitizePreset {
    /// One step more permissive; lenient stays lenient
    pub fn looser(self) -> Self {
        match self {
            SanitizePreset::Strict => SanitizePreset::Balanced,
            SanitizePreset::Balanced | SanitizePreset::Lenient => SanitizePreset::Lenient,
        }
    }
}

/// User-facing profiles; the last two are tuned lenient variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizeProfile {
    Strict,
    Balanced,
    Lenient,
    Rapid,
    Performance,
}

/// Parameters sent with a sanitize run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizeSettings {
    pub mode: SanitizeMode,
    pub preset: SanitizePreset,
    /// 0 keeps almost everything, 1 keeps only pristine speech
    pub strictness: f64,
    /// Run vocal separation before detection
    pub extract_vocals: bool,
}

impl Default for SanitizeSettings {
    fn default() -> Self {
        Self::from_profile(SanitizeProfile::Balanced)
    }
}

impl SanitizeSettings {
    pub fn from_profile(profile: SanitizeProfile) -> Self {
        let (preset, strictness) = match profile {
            SanitizeProfile::Strict => (SanitizePreset::Strict, 0.7),
            SanitizeProfile::Balanced => (SanitizePreset::Balanced, 0.5),
            SanitizeProfile::Lenient => (SanitizePreset::Lenient, 0.3),
            SanitizeProfile::Rapid => (SanitizePreset::Lenient, 0.3),
            SanitizeProfile::Performance => (SanitizePreset::Lenient, 0.4),
        };
        Self {
            mode: SanitizeMode::Auto,
            preset,
            strictness,
            extract_vocals: false,
        }
    }

    /// Clamp strictness into 0..=1
    pub fn with_strictness(mut self, strictness: f64) -> Self {
        self.strictness = if strictness.is_finite() {
            strictness.clamp(0.0, 1.0)
        } else {
            self.strictness
        };
        self
    }

    /// Whether `self` keeps at least as much as `other` and strictly more in some respect
    pub fn is_looser_than(&self, other: &SanitizeSettings) -> bool {
        let not_stricter = self.preset >= other.preset
            && self.strictness <= other.strictness
            && (!self.extract_vocals || other.extract_vocals);
        not_stricter && self != other
    }
}
