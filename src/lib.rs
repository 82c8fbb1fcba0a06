//! Voicebridge — a voice-recording ingestion pipeline.
//!
//! Detects recordings on removable media, stages and transcribes them,
//! classifies the results into tasks/notes/calendar entries, commits them to
//! a document store, verifies the commit, then archives and cleans up the
//! source audio. See `SPEC_FULL.md` for the full module breakdown.

pub mod analyzer;
pub mod archive;
pub mod core;
pub mod detect;
pub mod orchestrator;
pub mod parser;
pub mod resolver;
pub mod retry;
pub mod staging;
pub mod state;
pub mod store;
pub mod transcription;
pub mod verify;

pub use core::config::Config;
pub use core::error::PipelineError;
pub use orchestrator::{Orchestrator, RunOptions, RunReport};

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const APP_NAME: &str = "voicebridge";

/// Default configuration file name, resolved relative to the user's config
/// directory unless overridden with `--config`.
pub const CONFIG_FILE: &str = "voicebridge.toml";

/// Default log file name under the platform data directory.
pub const LOG_FILE: &str = "voicebridge.log";

/// Crate-wide result alias; `core::config` and the stage modules all return
/// their own leaf error types, converted into this at the boundary.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(APP_NAME, "voicebridge");
        assert_eq!(CONFIG_FILE, "voicebridge.toml");
    }
}
