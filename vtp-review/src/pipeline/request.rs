//! Stage invocation request

use crate::triage::SanitizeSettings;
use serde_json::{json, Map, Value};
use vtp_common::events::StageId;

/// Parameters of one stage run
#[derive(Debug, Clone, PartialEq)]
pub struct StageRequest {
    pub stage: StageId,
    pub vod_url: String,
    /// Sanitize parameters; defaults apply when absent
    pub sanitize: Option<SanitizeSettings>,
    /// Text to synthesize
    pub text: Option<String>,
    pub streamer: Option<String>,
    /// Re-run extraction even when audio already exists
    pub force: bool,
}

impl StageRequest {
    pub fn new(stage: StageId, vod_url: impl Into<String>) -> Self {
        Self {
            stage,
            vod_url: vod_url.into(),
            sanitize: None,
            text: None,
            streamer: None,
            force: false,
        }
    }

    pub fn with_sanitize(mut self, settings: SanitizeSettings) -> Self {
        self.sanitize = Some(settings);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_streamer(mut self, streamer: impl Into<String>) -> Self {
        self.streamer = Some(streamer.into());
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Sanitize settings in effect for this request
    pub fn sanitize_settings(&self) -> SanitizeSettings {
        self.sanitize.unwrap_or_default()
    }

    /// Request path below the API base, e.g. `/sanitize/run`
    pub fn path(&self) -> String {
        format!("/{}/run", self.stage.key())
    }

    /// JSON body; streamed stages carry `"stream": true`
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("vodUrl".to_string(), json!(self.vod_url));

        match self.stage {
            StageId::Extract => {
                body.insert("force".to_string(), json!(self.force));
            }
            StageId::Sanitize => {
                if let Value::Object(settings) = json!(self.sanitize_settings()) {
                    body.extend(settings);
                }
            }
            StageId::Synthesize => {
                body.insert("text".to_string(), json!(self.text.clone().unwrap_or_default()));
                body.insert(
                    "streamer".to_string(),
                    json!(self.streamer.clone().unwrap_or_default()),
                );
            }
            StageId::Transcribe | StageId::BuildDataset => {}
        }

        if self.stage.streams_events() {
            body.insert("stream".to_string(), Value::Bool(true));
        }
        Value::Object(body)
    }
}
