//! Review vocabulary shared by the engine and the backend wire format

use serde::{Deserialize, Serialize};
use std::fmt;

/// A reviewer's verdict on one segment. Absence of a decision means pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => f.write_str("accept"),
            Decision::Reject => f.write_str("reject"),
        }
    }
}

/// Which rendition of the source audio a track plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    /// Sanitized audio; rejected-upstream segments have no clean bounds
    Clean,
    /// Unprocessed extracted audio
    Original,
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackSource::Clean => f.write_str("clean"),
            TrackSource::Original => f.write_str("original"),
        }
    }
}
