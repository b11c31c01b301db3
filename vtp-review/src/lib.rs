//! Review and pipeline orchestration engine
//!
//! Sequences the voice-training pipeline's stages against the backend and
//! drives segment triage: decisions with undo, paged catalog projections,
//! windowed list math, bounded playback and auto-triage.

pub mod backend;
pub mod error;
pub mod jobs;
pub mod models;
pub mod pipeline;
pub mod playback;
pub mod review;
pub mod triage;

pub use error::{BackendError, ReviewError, Result};
