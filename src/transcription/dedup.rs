//! Duplicate avoidance keyed by audio stem (spec §4.4.3, §9 "preserve
//! stem-based behavior for parity with existing on-disk layouts").

use chrono::Utc;
use std::path::{Path, PathBuf};

pub struct DuplicateChecker {
    transcripts_dir: PathBuf,
    max_age_secs: u64,
}

impl DuplicateChecker {
    pub fn new(transcripts_dir: impl Into<PathBuf>, max_age_secs: u64) -> Self {
        Self { transcripts_dir: transcripts_dir.into(), max_age_secs }
    }

    /// If `<stem>.txt` already exists, is younger than the configured
    /// max-age, and has >= 10 characters, return its contents for reuse.
    pub fn existing_transcript(&self, stem: &str) -> Option<String> {
        let path = self.transcript_path(stem);
        let metadata = std::fs::metadata(&path).ok()?;
        let modified = metadata.modified().ok()?;
        let age = modified.elapsed().ok()?;
        if age.as_secs() > self.max_age_secs {
            return None;
        }

        let text = std::fs::read_to_string(&path).ok()?;
        if text.trim().len() < 10 {
            return None;
        }
        Some(text)
    }

    pub fn transcript_path(&self, stem: &str) -> PathBuf {
        self.transcripts_dir.join(format!("{stem}.txt"))
    }
}

/// True if a `SystemTime` predates "now minus max_age" — small helper kept
/// separate from `existing_transcript` so it's independently testable with
/// an injected reference time.
pub fn is_fresh(modified: std::time::SystemTime, max_age_secs: u64) -> bool {
    let now: chrono::DateTime<Utc> = Utc::now();
    let modified_dt: chrono::DateTime<Utc> = modified.into();
    (now - modified_dt) <= chrono::Duration::seconds(max_age_secs as i64)
}
