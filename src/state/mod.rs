//! Atomic JSON-backed session persistence (spec §4.1).
//!
//! Writes to a sibling temp file and renames over the target so a crash
//! mid-write never leaves partial JSON observable.

use crate::core::error::StateError;
use crate::core::types::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// `archive_management` block of the persisted schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveManagement {
    pub last_cleanup: Option<DateTime<Utc>>,
    pub retention_days: u32,
}

impl Default for ArchiveManagement {
    fn default() -> Self {
        Self { last_cleanup: None, retention_days: 7 }
    }
}

/// `system_health` block of the persisted schema.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemHealth {
    pub total_processed: u64,
    pub success_rate: f64,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
}

/// Top-level persisted state document (spec §4.1 "Schema").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub current_session: Option<Session>,
    pub previous_sessions: Vec<Session>,
    pub archive_management: ArchiveManagement,
    pub system_health: SystemHealth,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            current_session: None,
            previous_sessions: Vec::new(),
            archive_management: ArchiveManagement::default(),
            system_health: SystemHealth::default(),
        }
    }
}

impl PipelineState {
    /// A filename is "already processed" if it's in the in-flight session's
    /// list, or was archived by a previous session still inside the
    /// retention window (spec §4.1).
    pub fn is_already_processed(&self, filename: &str, now: DateTime<Utc>) -> bool {
        if let Some(session) = &self.current_session {
            if session.is_already_processed(filename) {
                return true;
            }
        }
        let retention = chrono::Duration::days(self.archive_management.retention_days as i64);
        self.previous_sessions.iter().any(|s| {
            now - s.started_at <= retention && s.archived_recordings.iter().any(|a| a.contains(filename))
        })
    }

    /// Move `current_session` into `previous_sessions`, trimming to the
    /// retention window (spec §4.9 "Finalization").
    pub fn finalize_current_session(&mut self, now: DateTime<Utc>) {
        if let Some(mut session) = self.current_session.take() {
            session.ended_at = Some(now);
            self.previous_sessions.push(session);
        }
        let retention = chrono::Duration::days(self.archive_management.retention_days as i64);
        self.previous_sessions.retain(|s| now - s.started_at <= retention);
    }
}

/// Loads and atomically persists a `PipelineState` at a fixed path
/// (default `.cache/recording_states.json`, spec §6).
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load failure on corrupt/absent state returns the default empty state
    /// and logs — it does not fail the session (spec §4.1 "Errors").
    pub fn load(&self) -> PipelineState {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(err) => {
                    warn!(path = %self.path.display(), %err, "corrupt state file, using default");
                    PipelineState::default()
                }
            },
            Err(err) => {
                info!(path = %self.path.display(), %err, "no existing state file, using default");
                PipelineState::default()
            }
        }
    }

    /// Atomic write: serialize to a sibling temp file, then rename over the
    /// target. No partial JSON is ever observable by a concurrent reader.
    pub fn save(&self, state: &PipelineState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StateError::Io)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(StateError::Serialization)?;

        let tmp_path = self.temp_path();
        std::fs::write(&tmp_path, json).map_err(StateError::Io)?;
        std::fs::rename(&tmp_path, &self.path).map_err(StateError::Io)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| format!(".{}.tmp", n.to_string_lossy()))
            .unwrap_or_else(|| ".state.tmp".to_string());
        self.path.with_file_name(file_name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Session;

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("recording_states.json"));
        let state = store.load();
        assert!(state.current_session.is_none());
        assert!(state.previous_sessions.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording_states.json");
        std::fs::write(&path, "{ not valid json").unwrap();
        let store = StateStore::new(path);
        let state = store.load();
        assert!(state.current_session.is_none());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("recording_states.json"));
        let mut state = PipelineState::default();
        state.current_session = Some(Session::new(Utc::now()));
        store.save(&state).unwrap();

        let loaded = store.load();
        assert!(loaded.current_session.is_some());
    }

    #[test]
    fn test_save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("recording_states.json"));
        store.save(&PipelineState::default()).unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_finalize_current_session_moves_and_trims() {
        let now = Utc::now();
        let mut state = PipelineState::default();
        state.current_session = Some(Session::new(now));
        state.archive_management.retention_days = 7;

        let mut stale = Session::new(now - chrono::Duration::days(30));
        stale.started_at = now - chrono::Duration::days(30);
        state.previous_sessions.push(stale);

        state.finalize_current_session(now);
        assert!(state.current_session.is_none());
        assert_eq!(state.previous_sessions.len(), 1);
        assert!(state.previous_sessions[0].ended_at.is_some());
    }
}
