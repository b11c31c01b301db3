//! In-memory audio element

use vtp_review::playback::AudioElement;

/// Records every call; loading completes only on [`FakeAudio::finish_loading`]
#[derive(Debug, Default)]
pub struct FakeAudio {
    pub source: Option<String>,
    pub ready: bool,
    pub position: f64,
    pub playing: bool,
    pub loads: Vec<String>,
    pub seeks: Vec<f64>,
}

impl FakeAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the current source loaded and return its URL for the load signal
    pub fn finish_loading(&mut self) -> String {
        self.ready = true;
        self.source.clone().unwrap_or_default()
    }

    pub fn advance_to(&mut self, position: f64) {
        self.position = position;
    }
}

impl AudioElement for FakeAudio {
    fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
        self.ready = false;
        self.playing = false;
        self.position = 0.0;
        self.loads.push(url.to_string());
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn seek(&mut self, position: f64) {
        self.position = position;
        self.seeks.push(position);
    }

    fn play(&mut self) {
        self.playing = true;
    }

    fn pause(&mut self) {
        self.playing = false;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn is_playing(&self) -> bool {
        self.playing
    }
}
