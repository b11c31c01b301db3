//! Inbound stage events and terminal results
//!
//! Streamed stages send one JSON object per line:
//! `{"type":"log","line":..}`, `{"type":"error","error":..}`,
//! `{"type":"done","result":{..}}`. Some stages put the result fields on the
//! `done` event itself instead of under `result`. Sub-step `progress` and
//! `stage` events are informational and never move the stage's own progress.

use serde::Deserialize;
use serde_json::{Map, Value};

/// Keys a result may use for its artifact path, in lookup order
const OUTPUT_PATH_KEYS: [&str; 6] = [
    "outputPath",
    "cleanPath",
    "audioPath",
    "srtPath",
    "datasetPath",
    "path",
];

/// One decoded stream event
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StageEvent {
    Log {
        line: String,
    },
    Error {
        #[serde(default)]
        error: Option<String>,
    },
    Done {
        #[serde(default)]
        result: Option<Value>,
        /// Result fields sent inline on the event
        #[serde(flatten)]
        inline: Map<String, Value>,
    },
    /// Sub-step progress (e.g. vocal separation), 0..=100
    Progress {
        #[serde(default)]
        stage: Option<String>,
        #[serde(default)]
        value: Option<f64>,
        #[serde(default)]
        message: Option<String>,
    },
    /// Sub-step boundary
    Stage {
        #[serde(default)]
        stage: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Terminal result of a stage run
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub output_path: Option<String>,
    pub log: Vec<String>,
    /// Full result object, for stage-specific fields
    pub raw: Value,
}

impl StageResult {
    /// Extract the artifact path and log from a backend result object
    ///
    /// Stages name their artifact differently (`cleanPath`, `outputPath`,
    /// ...); the first present key wins.
    pub fn from_value(raw: Value) -> Self {
        let output_path = OUTPUT_PATH_KEYS
            .iter()
            .find_map(|key| raw.get(*key).and_then(Value::as_str))
            .map(str::to_string);

        let log = raw
            .get("log")
            .and_then(Value::as_array)
            .map(|lines| {
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            output_path,
            log,
            raw,
        }
    }
}

impl StageEvent {
    /// Terminal result carried by a `done` event
    pub fn into_result(self) -> Option<StageResult> {
        match self {
            StageEvent::Done { result: Some(result), .. } => Some(StageResult::from_value(result)),
            StageEvent::Done { result: None, inline } => {
                Some(StageResult::from_value(Value::Object(inline)))
            }
            _ => None,
        }
    }
}
