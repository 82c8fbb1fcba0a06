//! Transcription backend interface (spec §4.4.1).

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Outcome of one `transcribe` call.
#[derive(Debug, Clone)]
pub struct BackendOutcome {
    pub ok: bool,
    pub text: String,
    pub error_message: Option<String>,
}

impl BackendOutcome {
    pub fn success(text: String) -> Self {
        Self { ok: true, text, error_message: None }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self { ok: false, text: String::new(), error_message: Some(error_message.into()) }
    }

    /// Success requires non-empty trimmed text >= 10 characters (spec §4.4.1).
    pub fn meets_minimum_length(&self) -> bool {
        self.text.trim().len() >= 10
    }
}

/// A transcription implementation conforming to the three-method
/// interface in spec §4.4.1.
#[async_trait]
pub trait TranscriptionBackend: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, estimated_seconds: f64) -> BackendOutcome;
    async fn is_available(&self) -> bool;
    fn name(&self) -> &str;
}

/// Per-file subprocess timeout for the local backend: `max(20 min, 0.5 *
/// estimated_seconds)` (spec §4.4.1, §5).
pub fn local_backend_timeout(estimated_seconds: f64) -> Duration {
    let floor = Duration::from_secs(20 * 60);
    let proportional = Duration::from_secs_f64((0.5 * estimated_seconds).max(0.0));
    floor.max(proportional)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meets_minimum_length() {
        assert!(!BackendOutcome::success("short".to_string()).meets_minimum_length());
        assert!(BackendOutcome::success("this is long enough".to_string()).meets_minimum_length());
    }

    #[test]
    fn test_local_backend_timeout_floor() {
        let timeout = local_backend_timeout(60.0);
        assert_eq!(timeout, Duration::from_secs(20 * 60));
    }

    #[test]
    fn test_local_backend_timeout_proportional() {
        // 0.5 * 3000s = 1500s > the 1200s floor
        let timeout = local_backend_timeout(3000.0);
        assert_eq!(timeout, Duration::from_secs(1500));
    }
}
