//! Local transcription backend: spawns a local Whisper CLI subprocess
//! (spec §4.4.1, §6 "Transcription backend — local").

use super::backend::{local_backend_timeout, BackendOutcome, TranscriptionBackend};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

pub struct LocalBackend {
    cli_path: String,
    model: String,
    language: String,
    output_dir: PathBuf,
}

impl LocalBackend {
    pub fn new(
        cli_path: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cli_path: cli_path.into(),
            model: model.into(),
            language: language.into(),
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl TranscriptionBackend for LocalBackend {
    async fn transcribe(&self, audio_path: &Path, estimated_seconds: f64) -> BackendOutcome {
        if let Err(err) = tokio::fs::create_dir_all(&self.output_dir).await {
            return BackendOutcome::failure(format!("cannot create output dir: {err}"));
        }

        let timeout = local_backend_timeout(estimated_seconds);

        let mut command = Command::new(&self.cli_path);
        command
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--language")
            .arg(&self.language)
            .arg("--output_dir")
            .arg(&self.output_dir)
            .arg("--output_format")
            .arg("txt");

        let run = async {
            match command.status().await {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(format!("subprocess exited with {status}")),
                Err(err) => Err(format!("failed to spawn whisper CLI: {err}")),
            }
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return BackendOutcome::failure(message),
            Err(_) => {
                warn!(?timeout, "local backend subprocess timed out");
                return BackendOutcome::failure("subprocess timeout");
            }
        }

        let stem = audio_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        let output_path = self.output_dir.join(format!("{stem}.txt"));

        match tokio::fs::read_to_string(&output_path).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(path = %output_path.display(), "local transcription produced output");
                BackendOutcome::success(text.trim().to_string())
            }
            Ok(_) => BackendOutcome::failure("output file present but empty"),
            Err(err) => BackendOutcome::failure(format!("output file absent: {err}")),
        }
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.cli_path)
            .arg("--help")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "local"
    }
}
