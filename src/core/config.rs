//! Configuration management for the voicebridge pipeline.
//!
//! Values are TOML-backed with `serde` defaults, and every leaf can be
//! overridden by an environment variable using the `DOTTED_KEY ->
//! DOTTED_KEY_UPPER` convention from spec §6 (e.g. `openai.model` ->
//! `OPENAI_MODEL`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub category_detection: CategoryDetectionConfig,
    #[serde(default)]
    pub project_matching: ProjectMatchingConfig,
    #[serde(default)]
    pub content_length: ContentLengthConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Detection & validation tunables (spec §4.2)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    #[serde(default = "default_skip_threshold_seconds")]
    pub skip_threshold_seconds: f64,
    #[serde(default = "default_max_file_minutes")]
    pub max_file_minutes: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            mount_path: default_mount_path(),
            skip_threshold_seconds: default_skip_threshold_seconds(),
            max_file_minutes: default_max_file_minutes(),
        }
    }
}

fn default_mount_path() -> String {
    "/Volumes/IC RECORDER/REC_FILE/FOLDER01".to_string()
}
fn default_skip_threshold_seconds() -> f64 {
    3.0
}
fn default_max_file_minutes() -> f64 {
    10.0
}

/// Staging manager tunables (spec §4.3)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self { staging_dir: default_staging_dir() }
    }
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(".cache/staging")
}

/// Transcription service tunables (spec §4.4)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// `auto`, `cloud`, or `local`
    #[serde(default = "default_backend_mode")]
    pub backend_mode: String,

    #[serde(default = "default_cloud_timeout_secs")]
    pub cloud_timeout_secs: u64,
    #[serde(default = "default_local_model")]
    pub local_model: String,
    #[serde(default = "default_local_language")]
    pub local_language: String,

    #[serde(default = "default_work_budget_minutes")]
    pub work_budget_minutes: f64,
    #[serde(default = "default_hard_max_files")]
    pub hard_max_files: usize,
    #[serde(default = "default_soft_min_files")]
    pub soft_min_files: usize,

    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_cpu_ceiling_percent")]
    pub cpu_ceiling_percent: f32,
    #[serde(default = "default_cpu_backoff_secs")]
    pub cpu_backoff_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_skip_patterns")]
    pub retry_skip_patterns: Vec<String>,

    #[serde(default = "default_min_transcript_words")]
    pub min_transcript_words: usize,
    #[serde(default = "default_min_transcript_bytes")]
    pub min_transcript_bytes: usize,

    #[serde(default = "default_disk_buffer_mib")]
    pub disk_buffer_mib: u64,
    #[serde(default = "default_min_free_ram_mib")]
    pub min_free_ram_mib: u64,

    #[serde(default = "default_dedup_max_age_secs")]
    pub dedup_max_age_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            backend_mode: default_backend_mode(),
            cloud_timeout_secs: default_cloud_timeout_secs(),
            local_model: default_local_model(),
            local_language: default_local_language(),
            work_budget_minutes: default_work_budget_minutes(),
            hard_max_files: default_hard_max_files(),
            soft_min_files: default_soft_min_files(),
            worker_pool_size: default_worker_pool_size(),
            cpu_ceiling_percent: default_cpu_ceiling_percent(),
            cpu_backoff_secs: default_cpu_backoff_secs(),
            max_retries: default_max_retries(),
            retry_skip_patterns: default_retry_skip_patterns(),
            min_transcript_words: default_min_transcript_words(),
            min_transcript_bytes: default_min_transcript_bytes(),
            disk_buffer_mib: default_disk_buffer_mib(),
            min_free_ram_mib: default_min_free_ram_mib(),
            dedup_max_age_secs: default_dedup_max_age_secs(),
        }
    }
}

fn default_backend_mode() -> String {
    "auto".to_string()
}
fn default_cloud_timeout_secs() -> u64 {
    30
}
fn default_local_model() -> String {
    "small".to_string()
}
fn default_local_language() -> String {
    "en".to_string()
}
fn default_work_budget_minutes() -> f64 {
    7.0
}
fn default_hard_max_files() -> usize {
    4
}
fn default_soft_min_files() -> usize {
    1
}
fn default_worker_pool_size() -> usize {
    3
}
fn default_cpu_ceiling_percent() -> f32 {
    70.0
}
fn default_cpu_backoff_secs() -> u64 {
    2
}
fn default_max_retries() -> u32 {
    1
}
fn default_retry_skip_patterns() -> Vec<String> {
    vec!["permission".to_string(), "transcript too short".to_string()]
}
fn default_min_transcript_words() -> usize {
    3
}
fn default_min_transcript_bytes() -> usize {
    10
}
fn default_disk_buffer_mib() -> u64 {
    100
}
fn default_min_free_ram_mib() -> u64 {
    1024
}
fn default_dedup_max_age_secs() -> u64 {
    3600
}

/// Category detection keyword configuration (spec §4.5)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDetectionConfig {
    #[serde(default = "default_task_keywords")]
    pub task_keywords: Vec<String>,
    #[serde(default = "default_note_keywords")]
    pub note_keywords: Vec<String>,
    #[serde(default = "default_task_imperatives")]
    pub task_imperative_verbs: Vec<String>,
    #[serde(default = "default_note_indicators")]
    pub note_indicators: Vec<String>,
    #[serde(default = "default_task_intent_patterns")]
    pub task_intent_patterns: Vec<String>,
    #[serde(default = "default_calendar_keywords")]
    pub calendar_keywords: Vec<String>,
}

impl Default for CategoryDetectionConfig {
    fn default() -> Self {
        Self {
            task_keywords: default_task_keywords(),
            note_keywords: default_note_keywords(),
            task_imperative_verbs: default_task_imperatives(),
            note_indicators: default_note_indicators(),
            task_intent_patterns: default_task_intent_patterns(),
            calendar_keywords: default_calendar_keywords(),
        }
    }
}

fn default_task_keywords() -> Vec<String> {
    vec!["task".to_string()]
}
fn default_note_keywords() -> Vec<String> {
    vec!["note".to_string()]
}
fn default_task_imperatives() -> Vec<String> {
    vec![
        "fix", "buy", "call", "schedule", "email", "text", "message", "book", "order", "submit",
        "review", "send", "create", "update", "remove", "cancel",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_note_indicators() -> Vec<String> {
    vec![
        "i noticed".to_string(),
        "i realized".to_string(),
        "was thinking".to_string(),
        "i've been thinking".to_string(),
        "it occurred to me".to_string(),
    ]
}
fn default_task_intent_patterns() -> Vec<String> {
    vec!["i want to".to_string(), "i need to".to_string(), "i should".to_string()]
}
fn default_calendar_keywords() -> Vec<String> {
    vec![
        "schedule a meeting".to_string(),
        "set up a call".to_string(),
        "block off time".to_string(),
        "put on the calendar".to_string(),
    ]
}

/// Project fuzzy-matching tunables (spec §4.6)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMatchingConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_catalog_max_age_minutes")]
    pub max_age_minutes: u64,
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
}

impl Default for ProjectMatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            max_age_minutes: default_catalog_max_age_minutes(),
            catalog_path: default_catalog_path(),
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    0.6
}
fn default_catalog_max_age_minutes() -> u64 {
    60
}
fn default_catalog_path() -> PathBuf {
    PathBuf::from(".cache/projects.json")
}

/// Content-length / preservation tunables (spec §4.5, §4.7)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentLengthConfig {
    #[serde(default = "default_preservation_threshold")]
    pub long_threshold: usize,
    #[serde(default = "default_task_excerpt_words")]
    pub task_excerpt_words: usize,
    #[serde(default = "default_note_excerpt_words")]
    pub note_excerpt_words: usize,
}

impl Default for ContentLengthConfig {
    fn default() -> Self {
        Self {
            long_threshold: default_preservation_threshold(),
            task_excerpt_words: default_task_excerpt_words(),
            note_excerpt_words: default_note_excerpt_words(),
        }
    }
}

fn default_preservation_threshold() -> usize {
    800
}
fn default_task_excerpt_words() -> usize {
    200
}
fn default_note_excerpt_words() -> usize {
    500
}

/// Document-store tunables (spec §4.8)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_base_url")]
    pub base_url: String,
    #[serde(default = "default_tasks_database_id")]
    pub tasks_database_id: String,
    #[serde(default = "default_notes_database_id")]
    pub notes_database_id: String,
    #[serde(default = "default_projects_database_id")]
    pub projects_database_id: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,
    #[serde(default = "default_chunk_chars")]
    pub chunk_chars: usize,
    #[serde(default = "default_verify_timeout_secs")]
    pub verify_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_base_url(),
            tasks_database_id: default_tasks_database_id(),
            notes_database_id: default_notes_database_id(),
            projects_database_id: default_projects_database_id(),
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            chunk_chars: default_chunk_chars(),
            verify_timeout_secs: default_verify_timeout_secs(),
        }
    }
}

fn default_store_base_url() -> String {
    "https://api.notion.com/v1".to_string()
}
fn default_tasks_database_id() -> String {
    String::new()
}
fn default_notes_database_id() -> String {
    String::new()
}
fn default_projects_database_id() -> String {
    String::new()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_secs() -> f64 {
    2.0
}
fn default_chunk_chars() -> usize {
    1800
}
fn default_verify_timeout_secs() -> u64 {
    10
}

/// LLM text-completion tunables (spec §4.7, §6) — prompts themselves are
/// out of scope; only the call-site contract (model, token budget) lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_max_tokens() -> u32 {
    256
}

/// Session / archive retention tunables (spec §3, §4.9)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { retention_days: default_retention_days() }
    }
}

fn default_retention_days() -> u32 {
    7
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            detection: DetectionConfig::default(),
            staging: StagingConfig::default(),
            transcription: TranscriptionConfig::default(),
            category_detection: CategoryDetectionConfig::default(),
            project_matching: ProjectMatchingConfig::default(),
            content_length: ContentLengthConfig::default(),
            store: StoreConfig::default(),
            openai: OpenAiConfig::default(),
            retention: RetentionConfig::default(),
        }
    }

    /// Load configuration from a TOML file, then apply environment overrides.
    pub fn from_file(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::core::error::ConfigError::Load(e.to_string()))?;

        let mut config: Config = toml::from_str(&content)
            .map_err(|e| crate::core::error::ConfigError::Parse(e.to_string()))?;

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from defaults if no file exists, else from file.
    pub fn load_or_default(path: &PathBuf) -> crate::Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::new();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Apply `DOTTED_KEY -> DOTTED_KEY_UPPER` environment overrides for the
    /// leaf fields that operators are most likely to tune from the shell
    /// (spec §6). A full reflective walk isn't worth the complexity for a
    /// handful of knobs; this mirrors the explicit list the original
    /// Python `ConfigLoader` checks.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OPENAI_MODEL") {
            self.openai.model = v;
        }
        if let Ok(v) = std::env::var("OPENAI_BASE_URL") {
            self.openai.base_url = v;
        }
        if let Ok(v) = std::env::var("NOTION_BASE_URL") {
            self.store.base_url = v;
        }
        if let Ok(v) = std::env::var("TASKS_DATABASE_ID") {
            self.store.tasks_database_id = v;
        }
        if let Ok(v) = std::env::var("NOTES_DATABASE_ID") {
            self.store.notes_database_id = v;
        }
        if let Ok(v) = std::env::var("PROJECTS_DATABASE_ID") {
            self.store.projects_database_id = v;
        }
        if let Ok(v) = std::env::var("TRANSCRIPTION_BACKEND_MODE") {
            self.transcription.backend_mode = v;
        }
        if let Ok(v) = std::env::var("MOUNT_PATH") {
            self.detection.mount_path = v;
        }
        if let Ok(v) = std::env::var("RETENTION_DAYS") {
            if let Ok(n) = v.parse() {
                self.retention.retention_days = n;
            }
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> crate::Result<()> {
        if self.transcription.worker_pool_size == 0 {
            return Err(crate::core::error::ConfigError::InvalidValue(
                "transcription.worker_pool_size must be >= 1".to_string(),
            )
            .into());
        }
        if self.transcription.hard_max_files == 0 {
            return Err(crate::core::error::ConfigError::InvalidValue(
                "transcription.hard_max_files must be >= 1".to_string(),
            )
            .into());
        }
        if self.transcription.work_budget_minutes <= 0.0 {
            return Err(crate::core::error::ConfigError::InvalidValue(
                "transcription.work_budget_minutes must be > 0".to_string(),
            )
            .into());
        }
        if self.store.max_attempts == 0 {
            return Err(crate::core::error::ConfigError::InvalidValue(
                "store.max_attempts must be >= 1".to_string(),
            )
            .into());
        }
        if !(0.0..=1.0).contains(&self.project_matching.fuzzy_threshold) {
            return Err(crate::core::error::ConfigError::InvalidValue(
                "project_matching.fuzzy_threshold must be in [0, 1]".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new();
        assert_eq!(config.transcription.worker_pool_size, 3);
        assert_eq!(config.content_length.long_threshold, 800);
        assert_eq!(config.retention.retention_days, 7);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new();
        assert!(config.validate().is_ok());

        config.transcription.worker_pool_size = 0;
        assert!(config.validate().is_err());
        config.transcription.worker_pool_size = 3;

        config.project_matching.fuzzy_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization_round_trip() {
        let config = Config::new();
        let toml_string = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.transcription.worker_pool_size, parsed.transcription.worker_pool_size);
        assert_eq!(config.store.chunk_chars, parsed.store.chunk_chars);
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("OPENAI_MODEL", "gpt-4o-mini");
        let mut config = Config::new();
        config.apply_env_overrides();
        assert_eq!(config.openai.model, "gpt-4o-mini");
        std::env::remove_var("OPENAI_MODEL");
    }
}
