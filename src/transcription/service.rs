//! Backend selection, bounded worker pool, and per-file retry/skip policy
//! (spec §4.4.2, §4.4.5, §4.4.6, §4.4.8).

use super::backend::TranscriptionBackend;
use super::resource::ResourceMonitor;
use crate::core::error::TranscriptionError;
use crate::core::types::{AudioSource, Transcript};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of transcribing one file, returned by a worker to the coordinator
/// (spec §9 "Worker pool": `(file, ok, text, err)`).
pub struct FileOutcome {
    pub source: AudioSource,
    pub result: Result<Transcript, TranscriptionError>,
}

pub struct TranscriptionService {
    backends: Vec<Arc<dyn TranscriptionBackend>>,
    worker_pool_size: usize,
    cpu_ceiling_percent: f32,
    cpu_backoff: Duration,
    retry_skip_patterns: Vec<String>,
    min_transcript_words: usize,
    min_transcript_bytes: usize,
}

impl TranscriptionService {
    pub fn new(
        backends: Vec<Arc<dyn TranscriptionBackend>>,
        worker_pool_size: usize,
        cpu_ceiling_percent: f32,
        cpu_backoff: Duration,
        retry_skip_patterns: Vec<String>,
        min_transcript_words: usize,
        min_transcript_bytes: usize,
    ) -> Self {
        Self {
            backends,
            worker_pool_size,
            cpu_ceiling_percent,
            cpu_backoff,
            retry_skip_patterns,
            min_transcript_words,
            min_transcript_bytes,
        }
    }

    /// Filter the configured backend list by `is_available()`, preserving
    /// order (spec §4.4.2 "auto" mode).
    pub async fn available_backends(&self) -> Vec<Arc<dyn TranscriptionBackend>> {
        let mut available = Vec::new();
        for backend in &self.backends {
            if backend.is_available().await {
                available.push(backend.clone());
            }
        }
        available
    }

    /// Try each available backend in order; the first `ok=true` wins.
    /// Applies the one-retry-unless-skip-listed policy per backend attempt
    /// (spec §4.4.6). Returns the name of the backend that succeeded.
    async fn transcribe_one(
        &self,
        available: &[Arc<dyn TranscriptionBackend>],
        source: &AudioSource,
    ) -> Result<(Transcript, String), TranscriptionError> {
        if available.is_empty() {
            return Err(TranscriptionError::NoBackendAvailable);
        }

        let estimated_seconds = source.estimated_minutes * 60.0;
        let mut last_error = String::new();

        for backend in available {
            let mut outcome = backend.transcribe(std::path::Path::new(&source.path), estimated_seconds).await;

            if !outcome.ok {
                let message = outcome.error_message.clone().unwrap_or_default();
                if self.is_skip_listed(&message) {
                    debug!(backend = backend.name(), %message, "skip-listed error, not retrying this backend");
                } else {
                    debug!(backend = backend.name(), %message, "retrying once after backend failure");
                    outcome = backend.transcribe(std::path::Path::new(&source.path), estimated_seconds).await;
                }
            }

            if outcome.ok && outcome.meets_minimum_length() {
                let transcript = Transcript::new(source.stem(), outcome.text, format!("{}.txt", source.stem()));
                return Ok((transcript, backend.name().to_string()));
            }

            if outcome.ok {
                return Err(TranscriptionError::TranscriptTooShort { len: outcome.text.trim().len() });
            }

            last_error = outcome.error_message.unwrap_or_else(|| "unknown error".to_string());
        }

        Err(TranscriptionError::AllBackendsFailed { path: source.path.clone(), last_error })
    }

    fn is_skip_listed(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.retry_skip_patterns.iter().any(|p| lower.contains(&p.to_lowercase()))
    }

    pub fn validate_transcript(&self, transcript: &Transcript) -> Result<(), TranscriptionError> {
        if transcript.text.trim().len() < self.min_transcript_bytes {
            return Err(TranscriptionError::TranscriptTooShort { len: transcript.text.trim().len() });
        }
        if transcript.word_count < self.min_transcript_words {
            return Err(TranscriptionError::TranscriptTooShort { len: transcript.text.trim().len() });
        }
        if unique_word_count(&transcript.text) < 3 {
            return Err(TranscriptionError::BackendFailed {
                backend: "validator".to_string(),
                message: "insufficient lexical diversity".to_string(),
            });
        }
        Ok(())
    }

    /// Run one batch through the bounded worker pool of size `P`. Ordering
    /// of completion within a batch is unspecified; batches themselves are
    /// processed sequentially by the caller (spec §4.4.5).
    pub async fn run_batch(&self, batch: Vec<AudioSource>) -> Vec<FileOutcome> {
        let available = self.available_backends().await;
        let queue = Arc::new(Mutex::new(VecDeque::from(batch)));
        let monitor = Arc::new(Mutex::new(ResourceMonitor::new()));
        let mut results = Vec::new();

        let worker_count = self.worker_pool_size.max(1);
        let mut join_set = tokio::task::JoinSet::new();

        for worker_id in 0..worker_count {
            let queue = queue.clone();
            let monitor = monitor.clone();
            let available = available.clone();
            let cpu_ceiling = self.cpu_ceiling_percent;
            let cpu_backoff = self.cpu_backoff;
            let service = self.clone_light();

            join_set.spawn(async move {
                let mut worker_results = Vec::new();
                loop {
                    let next = {
                        let mut q = queue.lock().await;
                        q.pop_front()
                    };
                    let Some(source) = next else { break };

                    let result = service.transcribe_one(&available, &source).await.map(|(t, backend)| {
                        debug!(worker_id, backend = %backend, file = %source.path, "transcription succeeded");
                        t
                    });

                    worker_results.push(FileOutcome { source, result });

                    let cpu = { monitor.lock().await.cpu_utilization_percent() };
                    if cpu > cpu_ceiling {
                        debug!(worker_id, cpu, ceiling = cpu_ceiling, "CPU over ceiling, backing off");
                        tokio::time::sleep(cpu_backoff).await;
                    }
                }
                worker_results
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(worker_results) => results.extend(worker_results),
                Err(err) => warn!(%err, "transcription worker task panicked"),
            }
        }

        info!(files = results.len(), "batch transcription complete");
        results
    }

    /// Cheap clone for moving into worker tasks — backends are reference
    /// counted, config fields are small and `Clone`.
    fn clone_light(&self) -> Self {
        Self {
            backends: self.backends.clone(),
            worker_pool_size: self.worker_pool_size,
            cpu_ceiling_percent: self.cpu_ceiling_percent,
            cpu_backoff: self.cpu_backoff,
            retry_skip_patterns: self.retry_skip_patterns.clone(),
            min_transcript_words: self.min_transcript_words,
            min_transcript_bytes: self.min_transcript_bytes,
        }
    }
}

fn unique_word_count(text: &str) -> usize {
    use std::collections::HashSet;
    text.split_whitespace().map(|w| w.to_lowercase()).collect::<HashSet<_>>().len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::backend::BackendOutcome;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyBackend {
        name: &'static str,
        available: bool,
        calls: AtomicUsize,
        fail_first_n: usize,
        response: &'static str,
    }

    #[async_trait]
    impl TranscriptionBackend for FlakyBackend {
        async fn transcribe(&self, _audio_path: &std::path::Path, _estimated_seconds: f64) -> BackendOutcome {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first_n {
                BackendOutcome::failure("transient failure")
            } else {
                BackendOutcome::success(self.response.to_string())
            }
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn name(&self) -> &str {
            self.name
        }
    }

    fn source(name: &str) -> AudioSource {
        let now = Utc::now();
        AudioSource::new(name.to_string(), 1024 * 1024, now, now)
    }

    #[tokio::test]
    async fn test_first_backend_success_wins() {
        let backend: Arc<dyn TranscriptionBackend> = Arc::new(FlakyBackend {
            name: "cloud",
            available: true,
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
            response: "this is a perfectly good transcript",
        });
        let service =
            TranscriptionService::new(vec![backend], 1, 70.0, Duration::from_secs(2), vec![], 3, 10);
        let available = service.available_backends().await;
        let (transcript, backend_name) = service.transcribe_one(&available, &source("a.mp3")).await.unwrap();
        assert_eq!(backend_name, "cloud");
        assert!(transcript.text.contains("good transcript"));
    }

    #[tokio::test]
    async fn test_retries_once_then_falls_through_to_next_backend() {
        let cloud: Arc<dyn TranscriptionBackend> = Arc::new(FlakyBackend {
            name: "cloud",
            available: true,
            calls: AtomicUsize::new(0),
            fail_first_n: 100,
            response: "unused",
        });
        let local: Arc<dyn TranscriptionBackend> = Arc::new(FlakyBackend {
            name: "local",
            available: true,
            calls: AtomicUsize::new(0),
            fail_first_n: 0,
            response: "local backend transcript text",
        });
        let service = TranscriptionService::new(
            vec![cloud, local],
            1,
            70.0,
            Duration::from_secs(2),
            vec![],
            3,
            10,
        );
        let available = service.available_backends().await;
        let (transcript, backend_name) = service.transcribe_one(&available, &source("a.mp3")).await.unwrap();
        assert_eq!(backend_name, "local");
        assert!(transcript.text.contains("local backend"));
    }

    #[tokio::test]
    async fn test_no_backend_available_errors() {
        let service = TranscriptionService::new(vec![], 1, 70.0, Duration::from_secs(2), vec![], 3, 10);
        let available = service.available_backends().await;
        let result = service.transcribe_one(&available, &source("a.mp3")).await;
        assert!(matches!(result, Err(TranscriptionError::NoBackendAvailable)));
    }

    #[test]
    fn test_skip_listed_error_not_retried() {
        let service = TranscriptionService::new(
            vec![],
            1,
            70.0,
            Duration::from_secs(2),
            vec!["permission".to_string()],
            3,
            10,
        );
        assert!(service.is_skip_listed("Permission denied reading file"));
        assert!(!service.is_skip_listed("connection reset"));
    }

    #[test]
    fn test_validate_transcript_rejects_low_diversity() {
        let service = TranscriptionService::new(vec![], 1, 70.0, Duration::from_secs(2), vec![], 3, 10);
        let transcript = Transcript::new("stem", "the the the the the the".to_string(), "stem.txt");
        assert!(service.validate_transcript(&transcript).is_err());
    }
}
