//! Archiver: copies verified source audio into a dated archive tree with a
//! three-strategy copy fallback and post-copy size verification
//! (spec §4.9 "Archiver").

use crate::core::error::ArchiveError;
use crate::core::types::ArchivePlan;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct Archiver {
    archive_root: PathBuf,
}

impl Archiver {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self { archive_root: archive_root.into() }
    }

    /// `Archives/YYYY-MM-DD/<session_id>/` for one session, retained until
    /// `retention_date` by the cleaner's purge pass.
    pub fn plan(&self, session_id: &str, now: DateTime<Utc>, retention_days: i64) -> ArchivePlan {
        let target_folder = self
            .archive_root
            .join(now.format("%Y-%m-%d").to_string())
            .join(session_id)
            .to_string_lossy()
            .to_string();
        ArchivePlan { target_folder, retention_date: now + chrono::Duration::days(retention_days) }
    }

    /// Copy `source` into `plan.target_folder` as `<stem>_<session_id>.mp3`,
    /// trying three strategies in order and verifying the resulting size
    /// matches the source before returning.
    pub fn archive_file(&self, source: &Path, stem: &str, session_id: &str, plan: &ArchivePlan) -> Result<PathBuf, ArchiveError> {
        std::fs::create_dir_all(&plan.target_folder)?;
        let destination = Path::new(&plan.target_folder).join(format!("{stem}_{session_id}.mp3"));

        let source_bytes = std::fs::metadata(source)?.len();

        if !try_std_copy(source, &destination) && !try_chunked_copy(source, &destination) && !try_subprocess_copy(source, &destination) {
            return Err(ArchiveError::CopyFailed(source.display().to_string()));
        }

        let archived_bytes = std::fs::metadata(&destination)?.len();
        if archived_bytes != source_bytes {
            return Err(ArchiveError::SizeMismatch {
                path: source.display().to_string(),
                source_bytes,
                archived_bytes,
            });
        }

        info!(source = %source.display(), destination = %destination.display(), "archived recording");
        Ok(destination)
    }
}

fn try_std_copy(source: &Path, destination: &Path) -> bool {
    std::fs::copy(source, destination).is_ok()
}

/// Fallback for filesystems where `fs::copy`'s fast-path (e.g. reflink)
/// fails partway: a plain buffered read/write loop.
fn try_chunked_copy(source: &Path, destination: &Path) -> bool {
    use std::io::{Read, Write};
    let Ok(mut src) = std::fs::File::open(source) else { return false };
    let Ok(mut dst) = std::fs::File::create(destination) else { return false };
    let mut buf = [0u8; 64 * 1024];
    loop {
        match src.read(&mut buf) {
            Ok(0) => return true,
            Ok(n) => {
                if dst.write_all(&buf[..n]).is_err() {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }
}

fn try_subprocess_copy(source: &Path, destination: &Path) -> bool {
    match std::process::Command::new("cp").arg(source).arg(destination).status() {
        Ok(status) => status.success(),
        Err(err) => {
            warn!(%err, "cp subprocess unavailable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_builds_dated_folder() {
        let archiver = Archiver::new("/mnt/archive");
        let now = DateTime::parse_from_rfc3339("2026-07-28T10:00:00Z").unwrap().with_timezone(&Utc);
        let plan = archiver.plan("session_20260728_100000", now, 7);
        assert_eq!(plan.target_folder, "/mnt/archive/2026-07-28/session_20260728_100000");
        assert_eq!(plan.retention_date, now + chrono::Duration::days(7));
    }

    #[test]
    fn test_archive_file_copies_and_verifies_size() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("230101_0001.mp3");
        std::fs::write(&source, b"fake mp3 bytes").unwrap();

        let archiver = Archiver::new(dst_dir.path());
        let plan = ArchivePlan { target_folder: dst_dir.path().join("2026-07-28/sess").to_string_lossy().to_string(), retention_date: Utc::now() };
        let result = archiver.archive_file(&source, "230101_0001", "sess", &plan).unwrap();
        assert_eq!(std::fs::read(&result).unwrap(), b"fake mp3 bytes");
        assert_eq!(result.file_name().unwrap().to_str().unwrap(), "230101_0001_sess.mp3");
    }

    #[test]
    fn test_archive_file_missing_source_errors() {
        let dst_dir = tempfile::tempdir().unwrap();
        let archiver = Archiver::new(dst_dir.path());
        let plan = ArchivePlan { target_folder: dst_dir.path().join("x").to_string_lossy().to_string(), retention_date: Utc::now() };
        let result = archiver.archive_file(Path::new("/nonexistent/file.mp3"), "stem", "sess", &plan);
        assert!(result.is_err());
    }
}
