//! Transcription subsystem: pluggable backend chain, batch planner, bounded
//! worker pool, resource monitor, and duplicate avoidance (spec §4.4).

pub mod backend;
pub mod batch;
pub mod cloud;
pub mod dedup;
pub mod local;
pub mod resource;
pub mod service;

pub use backend::{BackendOutcome, TranscriptionBackend};
pub use batch::BatchPlanner;
pub use cloud::CloudBackend;
pub use dedup::DuplicateChecker;
pub use local::LocalBackend;
pub use resource::{check_resources, PreflightFailure, ResourceMonitor};
pub use service::{FileOutcome, TranscriptionService};
