//! Pipeline stage orchestration
//!
//! - [`machine`]: stage lifecycle, unlock chain, overall progress
//! - [`stream`]: line decoding of streamed stage output
//! - [`runner`]: one stage run against the backend, with cancellation
//! - [`orchestrator`]: stage runs bound to a persisted job

pub mod estimate;
pub mod events;
pub mod machine;
pub mod orchestrator;
pub mod request;
pub mod runner;
pub mod stage;
pub mod stream;

pub use events::{StageEvent, StageResult};
pub use machine::{EventOutcome, PipelineStateMachine, StateTransition, CANCELED_MESSAGE};
pub use orchestrator::PipelineOrchestrator;
pub use request::StageRequest;
pub use runner::{StageOutcome, StageRunner};
pub use stage::{StageState, MAX_LOG_LINES};
