//! Test Helper Utilities
//!
//! Shared fakes and fixtures for vtp-review tests

#![allow(dead_code)]

pub mod audio;
pub mod fakes;
pub mod fixtures;

pub use audio::FakeAudio;
pub use fakes::FakeBackend;
pub use fixtures::{job, page, scored, segment};
