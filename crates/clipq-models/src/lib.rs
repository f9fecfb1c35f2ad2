//! Shared data models for the ClipQueue backend.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and lifecycle status
//! - Job payloads (clip parameters)
//! - Artifact references produced by the pipeline
//! - Status reports and queue statistics

pub mod artifact;
pub mod job;
pub mod payload;
pub mod report;

// Re-export common types
pub use artifact::ArtifactRef;
pub use job::{ErrorEntry, JobRecord, JobStatus};
pub use payload::{ClipParams, JobPayload, SubtitleCue};
pub use report::{JobStatusReport, QueueStats, SubmitOutcome};
