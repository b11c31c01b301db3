//! Data models shared across the engine and the backend wire format

mod job;
mod review;
mod segment;

pub use job::{Job, JobOutputs, JobPatch, JobSteps, NewJob};
pub use review::{ReviewState, ReviewSubmission, VoteRecord};
pub use segment::{Segment, SegmentPage, MISSING_SNR_DB, MISSING_SPEECH_RATIO};
