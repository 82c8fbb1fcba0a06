//! USB detector + file validator (spec §4.2).

use crate::core::error::DetectError;
use crate::core::types::AudioSource;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bytes-per-second proxy used by the duration check, matching the
/// original's `33 KiB / 2s` constant (spec §4.2).
const BYTES_PER_HALF_SECOND: f64 = 33.0 * 1024.0;

/// Reason a candidate file was rejected before transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Empty,
    TooShort,
    TooLarge,
    NotAnMp3,
    ResourceFork,
    AlreadyProcessed,
    Unreadable(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Empty => write!(f, "empty"),
            SkipReason::TooShort => write!(f, "file too short"),
            SkipReason::TooLarge => write!(f, "file too large"),
            SkipReason::NotAnMp3 => write!(f, "not an mp3"),
            SkipReason::ResourceFork => write!(f, "macOS resource fork"),
            SkipReason::AlreadyProcessed => write!(f, "already processed"),
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {msg}"),
        }
    }
}

/// Finds unprocessed audio on removable media (spec §4.2 "USB detector").
pub struct UsbDetector {
    mount_path: PathBuf,
}

impl UsbDetector {
    pub fn new(mount_path: impl Into<PathBuf>) -> Self {
        Self { mount_path: mount_path.into() }
    }

    /// Lists non-hidden `*.mp3` files under the mount path, excluding macOS
    /// resource forks (`._` prefix), filtered against `already_processed`.
    pub fn scan(
        &self,
        already_processed: &dyn Fn(&str) -> bool,
    ) -> Result<Vec<PathBuf>, DetectError> {
        let entries = std::fs::read_dir(&self.mount_path).map_err(|e| {
            DetectError::MountUnreadable(format!("{}: {e}", self.mount_path.display()))
        })?;

        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(DetectError::Io)?;
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.starts_with("._") {
                debug!(file = name, "skipping macOS resource fork");
                continue;
            }
            if !name.to_lowercase().ends_with(".mp3") {
                continue;
            }
            if already_processed(name) {
                debug!(file = name, "already processed, skipping");
                continue;
            }
            found.push(path);
        }

        info!(mount = %self.mount_path.display(), count = found.len(), "detection scan complete");
        Ok(found)
    }

    pub fn is_readable(&self) -> bool {
        std::fs::read_dir(&self.mount_path).is_ok()
    }
}

/// Validates candidate audio files (spec §4.2 "File validator").
pub struct FileValidator {
    pub skip_threshold_seconds: f64,
    pub max_file_minutes: f64,
}

impl FileValidator {
    pub fn new(skip_threshold_seconds: f64, max_file_minutes: f64) -> Self {
        Self { skip_threshold_seconds, max_file_minutes }
    }

    /// Validate one candidate, returning either an `AudioSource` or the
    /// reason it was rejected.
    pub fn validate(&self, path: &Path) -> Result<AudioSource, SkipReason> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| SkipReason::Unreadable(e.to_string()))?;

        if metadata.len() == 0 {
            return Err(SkipReason::Empty);
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if name.starts_with("._") {
            return Err(SkipReason::ResourceFork);
        }
        if !name.to_lowercase().ends_with(".mp3") {
            return Err(SkipReason::NotAnMp3);
        }

        self.read_header(path)?;

        let min_bytes = self.skip_threshold_seconds * 2.0 * BYTES_PER_HALF_SECOND;
        if (metadata.len() as f64) < min_bytes {
            return Err(SkipReason::TooShort);
        }

        let estimated_minutes = metadata.len() as f64 / (1024.0 * 1024.0);
        if estimated_minutes > self.max_file_minutes {
            return Err(SkipReason::TooLarge);
        }

        let created_ts = system_time_to_utc(metadata.created().ok());
        let modified_ts = system_time_to_utc(metadata.modified().ok());

        Ok(AudioSource::new(
            path.to_string_lossy().to_string(),
            metadata.len(),
            created_ts,
            modified_ts,
        ))
    }

    /// Minimum readable header (first 1 KiB, spec §4.2).
    fn read_header(&self, path: &Path) -> Result<(), SkipReason> {
        use std::io::Read;
        let mut file =
            std::fs::File::open(path).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        let mut buf = [0u8; 1024];
        let read = file.read(&mut buf).map_err(|e| SkipReason::Unreadable(e.to_string()))?;
        if read == 0 {
            return Err(SkipReason::Unreadable("empty header".to_string()));
        }
        Ok(())
    }

    /// Validate a whole candidate list, logging per-file skip reasons and
    /// returning only the survivors plus the skip list.
    pub fn validate_all(&self, paths: &[PathBuf]) -> (Vec<AudioSource>, Vec<(PathBuf, SkipReason)>) {
        let mut valid = Vec::new();
        let mut skipped = Vec::new();
        for path in paths {
            match self.validate(path) {
                Ok(source) => valid.push(source),
                Err(reason) => {
                    warn!(path = %path.display(), %reason, "validation rejected file");
                    skipped.push((path.clone(), reason));
                }
            }
        }
        (valid, skipped)
    }
}

fn system_time_to_utc(time: Option<std::time::SystemTime>) -> DateTime<Utc> {
    time.map(DateTime::<Utc>::from).unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_mp3(dir: &Path, name: &str, size: usize) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0xFFu8; size]).unwrap();
        path
    }

    #[test]
    fn test_validate_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mp3(dir.path(), "empty.mp3", 0);
        let validator = FileValidator::new(3.0, 10.0);
        assert_eq!(validator.validate(&path).unwrap_err(), SkipReason::Empty);
    }

    #[test]
    fn test_validate_rejects_resource_fork() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mp3(dir.path(), "._rec.mp3", 1024 * 200);
        let validator = FileValidator::new(3.0, 10.0);
        assert_eq!(validator.validate(&path).unwrap_err(), SkipReason::ResourceFork);
    }

    #[test]
    fn test_validate_rejects_too_short() {
        let dir = tempfile::tempdir().unwrap();
        // well under 3s * 2 * 33KiB threshold
        let path = write_mp3(dir.path(), "short.mp3", 1024);
        let validator = FileValidator::new(3.0, 10.0);
        assert_eq!(validator.validate(&path).unwrap_err(), SkipReason::TooShort);
    }

    #[test]
    fn test_validate_accepts_reasonable_file() {
        let dir = tempfile::tempdir().unwrap();
        // ~1 MiB, above the short-file threshold, below the 10-minute cap
        let path = write_mp3(dir.path(), "rec.mp3", 1024 * 1024);
        let validator = FileValidator::new(3.0, 10.0);
        let source = validator.validate(&path).unwrap();
        assert!((source.estimated_minutes - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_rejects_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mp3(dir.path(), "huge.mp3", 1024 * 1024 * 11);
        let validator = FileValidator::new(3.0, 10.0);
        assert_eq!(validator.validate(&path).unwrap_err(), SkipReason::TooLarge);
    }

    #[test]
    fn test_usb_detector_excludes_resource_forks_and_processed() {
        let dir = tempfile::tempdir().unwrap();
        write_mp3(dir.path(), "rec1.mp3", 2048);
        write_mp3(dir.path(), "._rec1.mp3", 2048);
        write_mp3(dir.path(), "rec2.mp3", 2048);
        write_mp3(dir.path(), "notes.txt", 2048);

        let detector = UsbDetector::new(dir.path());
        let found = detector.scan(&|name| name == "rec2.mp3").unwrap();

        assert_eq!(found.len(), 1);
        assert!(found[0].to_string_lossy().ends_with("rec1.mp3"));
    }
}
