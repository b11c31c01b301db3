//! # VTP Common Library
//!
//! Shared code for the voice training pipeline tools including:
//! - Event types (VtpEvent enum) and the EventBus
//! - Stage and decision vocabulary shared by client and engine
//! - Bootstrap configuration loading and persisted view preferences
//! - Human-readable time formatting

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;

pub use error::{Error, Result};
