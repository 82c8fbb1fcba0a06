//! Staging manager + safe deletion chain (spec §4.3).
//!
//! Removable media often has quirky permissions and extended attributes
//! that block in-place reads; this copies each validated source into a
//! local staging directory first.

use crate::core::error::StagingError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct StagingManager {
    staging_dir: PathBuf,
}

impl StagingManager {
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self { staging_dir: staging_dir.into() }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Copy `source` into the staging directory, stripping extended
    /// attributes (best-effort) and normalizing mode bits. Reuses an
    /// existing staged file of matching size; re-copies on mismatch.
    pub fn stage(&self, source: &Path) -> Result<PathBuf, StagingError> {
        std::fs::create_dir_all(&self.staging_dir).map_err(StagingError::Io)?;

        let file_name = source
            .file_name()
            .ok_or_else(|| StagingError::Copy {
                path: source.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
            })?;
        let target = self.staging_dir.join(file_name);

        let source_size = std::fs::metadata(source).map_err(StagingError::Io)?.len();

        if let Ok(existing) = std::fs::metadata(&target) {
            if existing.len() == source_size {
                debug!(path = %target.display(), "reusing existing staged file");
                return Ok(target);
            }
            debug!(path = %target.display(), "staged file size mismatch, re-copying");
        }

        std::fs::copy(source, &target)
            .map_err(|e| StagingError::Copy { path: source.display().to_string(), source: e })?;

        self.strip_xattrs(&target);
        self.normalize_mode(&target);

        Ok(target)
    }

    #[cfg(unix)]
    fn strip_xattrs(&self, path: &Path) {
        // Best-effort; xattr removal failures are never fatal to staging.
        if let Err(err) = std::process::Command::new("xattr").arg("-c").arg(path).status() {
            warn!(path = %path.display(), %err, "failed to strip extended attributes (ignored)");
        }
    }

    #[cfg(not(unix))]
    fn strip_xattrs(&self, _path: &Path) {}

    #[cfg(unix)]
    fn normalize_mode(&self, path: &Path) {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o644);
            let _ = std::fs::set_permissions(path, perms);
        }
    }

    #[cfg(not(unix))]
    fn normalize_mode(&self, _path: &Path) {}

    /// Remove all staged files at end-of-session.
    pub fn clear(&self) -> Result<(), StagingError> {
        if !self.staging_dir.exists() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&self.staging_dir).map_err(StagingError::Io)? {
            let entry = entry.map_err(StagingError::Io)?;
            if let Err(err) = std::fs::remove_file(entry.path()) {
                warn!(path = %entry.path().display(), %err, "failed to clear staged file");
            }
        }
        Ok(())
    }
}

/// Tries direct unlink, then clearing the read-only bit and retrying, then
/// spawning `rm -f`. Returns `false` (never errors) on total failure — the
/// pipeline treats this as non-fatal and the operator can remove the file
/// manually (spec §4.3 "Safe deletion of source audio").
pub fn safe_delete(path: &Path) -> bool {
    if std::fs::remove_file(path).is_ok() {
        return true;
    }
    if clear_readonly_and_retry(path) {
        return true;
    }
    match std::process::Command::new("rm").arg("-f").arg(path).status() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(path = %path.display(), code = ?status.code(), "rm -f reported failure");
            false
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "all delete strategies failed");
            false
        }
    }
}

fn clear_readonly_and_retry(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    let mut perms = metadata.permissions();
    if !perms.readonly() {
        return false;
    }
    perms.set_readonly(false);
    if std::fs::set_permissions(path, perms).is_err() {
        return false;
    }
    std::fs::remove_file(path).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &[u8]) {
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(contents).unwrap();
    }

    #[test]
    fn test_stage_copies_file() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let source_path = source_dir.path().join("rec.mp3");
        write_file(&source_path, b"hello world");

        let manager = StagingManager::new(staging_dir.path());
        let staged = manager.stage(&source_path).unwrap();

        assert!(staged.exists());
        assert_eq!(std::fs::read(&staged).unwrap(), b"hello world");
    }

    #[test]
    fn test_stage_reuses_matching_size() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let source_path = source_dir.path().join("rec.mp3");
        write_file(&source_path, b"hello world");

        let manager = StagingManager::new(staging_dir.path());
        let first = manager.stage(&source_path).unwrap();
        let first_modified = std::fs::metadata(&first).unwrap().modified().unwrap();

        std::thread::sleep(std::time::Duration::from_millis(10));
        let second = manager.stage(&source_path).unwrap();
        let second_modified = std::fs::metadata(&second).unwrap().modified().unwrap();

        assert_eq!(first_modified, second_modified);
    }

    #[test]
    fn test_clear_removes_staged_files() {
        let source_dir = tempfile::tempdir().unwrap();
        let staging_dir = tempfile::tempdir().unwrap();
        let source_path = source_dir.path().join("rec.mp3");
        write_file(&source_path, b"hello world");

        let manager = StagingManager::new(staging_dir.path());
        manager.stage(&source_path).unwrap();
        manager.clear().unwrap();

        let remaining: Vec<_> = std::fs::read_dir(staging_dir.path()).unwrap().collect();
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_safe_delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.mp3");
        write_file(&path, b"data");
        assert!(safe_delete(&path));
        assert!(!path.exists());
    }

    #[test]
    fn test_safe_delete_missing_file_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.mp3");
        assert!(!safe_delete(&path));
    }
}
