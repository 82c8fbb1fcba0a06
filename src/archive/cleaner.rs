//! Cleaner: deletes the original recording from the recorder and its
//! transcript file after a successful archive + verify, and purges archive
//! folders past retention (spec §4.9 "Cleaner", §4.9.1 supplemental
//! retention purge).

use crate::core::types::FailedEntry;
use crate::staging::{safe_delete, StagingManager};
use chrono::{DateTime, Utc};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct CleanupOutcome {
    pub deleted: Vec<String>,
    pub failures: Vec<FailedEntry>,
}

pub struct Cleaner {
    staging: StagingManager,
    transcripts_dir: std::path::PathBuf,
}

impl Cleaner {
    pub fn new(staging: StagingManager, transcripts_dir: impl Into<std::path::PathBuf>) -> Self {
        Self { staging, transcripts_dir: transcripts_dir.into() }
    }

    /// Delete one recording's original audio (on the recorder at
    /// `original_audio_path`) and its transcript once its `AnalysisRecord`s
    /// are committed and verified. Never returns Err — failures are tracked
    /// per-file so one bad deletion doesn't abort the stage (spec §4.9,
    /// §4.3 "safe delete").
    pub fn cleanup_one(&self, original_audio_path: &Path, stem: &str) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::default();

        if safe_delete(original_audio_path) {
            outcome.deleted.push(original_audio_path.display().to_string());
        } else if original_audio_path.exists() {
            outcome.failures.push(FailedEntry::new(
                original_audio_path.display().to_string(),
                "all delete strategies failed for source audio",
            ));
        }

        let transcript_path = self.transcripts_dir.join(format!("{stem}.txt"));
        if transcript_path.exists() {
            if safe_delete(&transcript_path) {
                outcome.deleted.push(transcript_path.display().to_string());
            } else {
                outcome.failures.push(FailedEntry::new(
                    transcript_path.display().to_string(),
                    "all delete strategies failed for transcript",
                ));
            }
        }

        outcome
    }

    /// Wipe the whole staging directory once a session's cleanup is
    /// otherwise complete (spec §4.3 `clear`, §4.9 session teardown).
    pub fn wipe_staging(&self) {
        if let Err(err) = self.staging.clear() {
            warn!(%err, "failed to wipe staging directory");
        }
    }

    /// Delete archive date-folders whose retention date has passed
    /// (spec §4.9.1). Best-effort: logs and continues past any folder it
    /// can't remove.
    pub fn purge_expired_archives(&self, archive_root: &Path, now: DateTime<Utc>, retention_days: i64) -> Vec<String> {
        let mut purged = Vec::new();
        let Ok(entries) = std::fs::read_dir(archive_root) else {
            return purged;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else { continue };
            let Ok(folder_date) = chrono::NaiveDate::parse_from_str(name, "%Y-%m-%d") else { continue };
            let folder_datetime = DateTime::<Utc>::from_naive_utc_and_offset(folder_date.and_hms_opt(0, 0, 0).unwrap(), Utc);

            if now - folder_datetime > chrono::Duration::days(retention_days) {
                match std::fs::remove_dir_all(&path) {
                    Ok(()) => {
                        info!(folder = %path.display(), "purged expired archive folder");
                        purged.push(path.display().to_string());
                    }
                    Err(err) => warn!(folder = %path.display(), %err, "failed to purge expired archive folder"),
                }
            }
        }

        purged
    }
}
