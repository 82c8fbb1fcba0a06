//! Error types and error handling for the voicebridge pipeline.

use thiserror::Error;

/// Main error type for the pipeline orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Detection / validation errors
    #[error("detect error: {0}")]
    Detect(#[from] DetectError),

    /// Staging errors
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    /// Transcription errors
    #[error("transcription error: {0}")]
    Transcription(#[from] TranscriptionError),

    /// Transcript parsing / classification errors
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),

    /// Project resolver errors
    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Analyzer (enrichment) errors
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),

    /// Document-store write errors
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Verification errors
    #[error("verify error: {0}")]
    Verify(#[from] VerifyError),

    /// Archive / cleanup errors
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Session state errors
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Configuration errors
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other errors
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// The abstract failure kinds from the error-handling taxonomy (spec §7).
///
/// `RetryPolicy` (see `crate::retry`) consults this to decide whether to
/// retry, skip, or surface an error immediately — the single retry-policy
/// object called for in the design notes, instead of duplicating the
/// classification at each call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Network blip, 5xx, timeout — retry with standard exponential backoff.
    TransientExternal,
    /// HTTP 429 or "rate" in the message — retry with doubled backoff.
    RateLimitExternal,
    /// 4xx other than 429, malformed request — never retry.
    ClientMisuse,
    /// Disk/memory exhaustion — abort the stage, do not retry.
    ResourceExhaustion,
    /// Cannot read/delete source on removable media — log and continue.
    MediaPermission,
    /// No transcription backend available — abort the stage.
    BackendAbsence,
    /// Short/corrupt file or transcript — route to failed, never retry.
    ValidationFailure,
    /// Store verification returned 404/archived — never archive, never retry.
    StoreVerificationMiss,
}

/// Implemented by every leaf error enum so the retry wrapper can classify
/// failures without each call site re-deriving the same rate-limit regex.
pub trait Classify {
    fn retry_class(&self) -> RetryClass;
}

/// Detection & validation errors (spec §4.2)
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("mount path not readable: {0}")]
    MountUnreadable(String),

    #[error("file validation failed for {path}: {reason}")]
    Validation { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Staging manager errors (spec §4.3)
#[derive(Error, Debug)]
pub enum StagingError {
    #[error("failed to copy {path} to staging: {source}")]
    Copy { path: String, source: std::io::Error },

    #[error("failed to strip extended attributes on {0} (ignored)")]
    XattrStrip(String),

    #[error("all delete strategies failed for {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transcription service errors (spec §4.4)
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("no transcription backend available")]
    NoBackendAvailable,

    #[error("backend '{backend}' failed: {message}")]
    BackendFailed { backend: String, message: String },

    #[error("all backends failed for {path}: {last_error}")]
    AllBackendsFailed { path: String, last_error: String },

    #[error("subprocess timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transcript too short ({len} chars)")]
    TranscriptTooShort { len: usize },

    #[error("insufficient free disk space: need {need_mb} MiB, have {have_mb} MiB")]
    InsufficientDisk { need_mb: u64, have_mb: u64 },

    #[error("insufficient free memory: need {need_mb} MiB, have {have_mb} MiB")]
    InsufficientMemory { need_mb: u64, have_mb: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Classify for TranscriptionError {
    fn retry_class(&self) -> RetryClass {
        match self {
            TranscriptionError::NoBackendAvailable => RetryClass::BackendAbsence,
            TranscriptionError::InsufficientDisk { .. }
            | TranscriptionError::InsufficientMemory { .. } => RetryClass::ResourceExhaustion,
            TranscriptionError::TranscriptTooShort { .. } => RetryClass::ValidationFailure,
            TranscriptionError::Timeout(_) => RetryClass::TransientExternal,
            TranscriptionError::BackendFailed { message, .. } => classify_message(message),
            _ => RetryClass::ValidationFailure,
        }
    }
}

/// Transcript parser / category detector errors (spec §4.5)
#[derive(Error, Debug)]
pub enum ParserError {
    #[error("empty transcript text")]
    EmptyTranscript,
}

/// Project resolver errors (spec §4.6)
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("catalog refresh failed: {0}")]
    RefreshFailed(String),

    #[error("no catalog available (store unreachable, cache empty, fallback exhausted)")]
    CatalogUnavailable,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Analyzer (enrichment) errors (spec §4.7)
#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("LLM call failed: {0}")]
    LlmFailed(String),
}

/// Document-store write errors (spec §4.8)
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("client error ({status}): {message}")]
    ClientError { status: u16, message: String },

    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("store returned no page id")]
    MissingPageId,
}

impl Classify for StoreError {
    fn retry_class(&self) -> RetryClass {
        match self {
            StoreError::RateLimited(_) => RetryClass::RateLimitExternal,
            StoreError::Transient(_) | StoreError::ServerError { .. } => {
                RetryClass::TransientExternal
            }
            StoreError::ClientError { .. } | StoreError::MissingPageId => {
                RetryClass::ClientMisuse
            }
        }
    }
}

/// Verification errors (spec §4.9)
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("page not found: {0}")]
    NotFound(String),

    #[error("page is archived: {0}")]
    Archived(String),

    #[error("verification request timed out")]
    Timeout,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Archive / cleanup errors (spec §4.9)
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive copy size mismatch for {path}: source={source_bytes}, archived={archived_bytes}")]
    SizeMismatch {
        path: String,
        source_bytes: u64,
        archived_bytes: u64,
    },

    #[error("no copy strategy succeeded for {0}")]
    CopyFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session state persistence errors (spec §4.1)
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to load state: {0}")]
    Load(String),

    #[error("failed to save state: {0}")]
    Save(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration file: {0}")]
    Load(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Classify a raw error message the way the document-store retry wrapper
/// does: look for "rate" / "429" first, otherwise treat as transient.
pub fn classify_message(message: &str) -> RetryClass {
    let lower = message.to_lowercase();
    if lower.contains("429") || lower.contains("rate") {
        RetryClass::RateLimitExternal
    } else {
        RetryClass::TransientExternal
    }
}

impl From<String> for PipelineError {
    fn from(err: String) -> Self {
        PipelineError::Unknown(err)
    }
}

impl From<&str> for PipelineError {
    fn from(err: &str) -> Self {
        PipelineError::Unknown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let pipeline_error: PipelineError = io_error.into();
        match pipeline_error {
            PipelineError::Io(_) => (),
            _ => panic!("expected Io error"),
        }
    }

    #[test]
    fn test_string_error_conversion() {
        let error: PipelineError = "test error".into();
        match error {
            PipelineError::Unknown(msg) => assert_eq!(msg, "test error"),
            _ => panic!("expected Unknown error"),
        }
    }

    #[test]
    fn test_classify_rate_limit() {
        assert_eq!(classify_message("HTTP 429 too many requests"), RetryClass::RateLimitExternal);
        assert_eq!(classify_message("Rate limit exceeded"), RetryClass::RateLimitExternal);
        assert_eq!(classify_message("connection reset"), RetryClass::TransientExternal);
    }

    #[test]
    fn test_store_error_classification() {
        assert_eq!(
            StoreError::RateLimited("x".into()).retry_class(),
            RetryClass::RateLimitExternal
        );
        assert_eq!(
            StoreError::ClientError { status: 400, message: "x".into() }.retry_class(),
            RetryClass::ClientMisuse
        );
        assert_eq!(
            StoreError::ServerError { status: 503, message: "x".into() }.retry_class(),
            RetryClass::TransientExternal
        );
    }
}
