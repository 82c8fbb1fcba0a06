//! Cloud transcription backend: submits audio to a remote Whisper-class API
//! (spec §4.4.1, §6 "Transcription backend — cloud").

use super::backend::{BackendOutcome, TranscriptionBackend};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub struct CloudBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl CloudBackend {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url: base_url.into(), api_key, model: model.into() }
    }
}

#[async_trait]
impl TranscriptionBackend for CloudBackend {
    async fn transcribe(&self, audio_path: &Path, _estimated_seconds: f64) -> BackendOutcome {
        let bytes = match tokio::fs::read(audio_path).await {
            Ok(bytes) => bytes,
            Err(err) => return BackendOutcome::failure(format!("read error: {err}")),
        };

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = match reqwest::multipart::Part::bytes(bytes).file_name(file_name).mime_str("audio/mpeg") {
            Ok(part) => part,
            Err(err) => return BackendOutcome::failure(format!("multipart error: {err}")),
        };

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", part);

        let mut request = self.client.post(format!("{}/audio/transcriptions", self.base_url)).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                match response.text().await {
                    Ok(text) if status.is_success() => {
                        debug!(chars = text.len(), "cloud transcription succeeded");
                        BackendOutcome::success(text.trim().to_string())
                    }
                    Ok(text) => {
                        let message = format!("HTTP {status}: {text}");
                        warn!(%message, "cloud backend returned error status");
                        BackendOutcome::failure(message)
                    }
                    Err(err) => BackendOutcome::failure(format!("response read error: {err}")),
                }
            }
            Err(err) if err.is_timeout() => BackendOutcome::failure("timeout"),
            Err(err) => BackendOutcome::failure(err.to_string()),
        }
    }

    async fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn name(&self) -> &str {
        "cloud"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_without_api_key() {
        let backend = CloudBackend::new("https://example.invalid", None, "whisper-1", Duration::from_secs(5));
        assert!(!backend.is_available().await);
    }

    #[tokio::test]
    async fn test_available_with_api_key() {
        let backend = CloudBackend::new(
            "https://example.invalid",
            Some("sk-test".to_string()),
            "whisper-1",
            Duration::from_secs(5),
        );
        assert!(backend.is_available().await);
    }

    #[test]
    fn test_name() {
        let backend = CloudBackend::new("https://example.invalid", None, "whisper-1", Duration::from_secs(5));
        assert_eq!(backend.name(), "cloud");
    }
}
