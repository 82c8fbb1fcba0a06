//! Core data model shared across every pipeline stage (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A source audio file discovered on removable media (spec §3 `AudioSource`).
///
/// `estimated_minutes` is a rough bitrate-proxy derived from file size, not
/// a decoded duration — good enough for batch planning, not for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSource {
    pub path: String,
    pub size_bytes: u64,
    pub estimated_minutes: f64,
    pub created_ts: DateTime<Utc>,
    pub modified_ts: DateTime<Utc>,
}

/// Approximate bitrate proxy: 1 MiB per minute (~128 kbps).
const BYTES_PER_ESTIMATED_MINUTE: f64 = 1024.0 * 1024.0;

impl AudioSource {
    pub fn new(
        path: impl Into<String>,
        size_bytes: u64,
        created_ts: DateTime<Utc>,
        modified_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            estimated_minutes: size_bytes as f64 / BYTES_PER_ESTIMATED_MINUTE,
            created_ts,
            modified_ts,
        }
    }

    pub fn stem(&self) -> String {
        std::path::Path::new(&self.path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Text output of Stage 3 for one audio file (spec §3 `Transcript`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub audio_stem: String,
    pub text: String,
    pub path: String,
    pub word_count: usize,
}

impl Transcript {
    pub fn new(audio_stem: impl Into<String>, text: String, path: impl Into<String>) -> Self {
        let word_count = text.split_whitespace().count();
        Self { audio_stem: audio_stem.into(), text, path: path.into(), word_count }
    }
}

/// The two entity kinds a transcript can become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Task,
    Note,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Task => write!(f, "task"),
            Category::Note => write!(f, "note"),
        }
    }
}

/// Result of the five-tier category detector (spec §3 `CategoryDecision`, §4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryDecision {
    pub category: Category,
    pub confidence: f64,
    pub manual_review_flag: bool,
}

/// Coarse time-budget bucket for a task (spec §4.7 Duration estimator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DurationCategory {
    Quick,
    Medium,
    Long,
}

impl std::fmt::Display for DurationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DurationCategory::Quick => write!(f, "QUICK"),
            DurationCategory::Medium => write!(f, "MEDIUM"),
            DurationCategory::Long => write!(f, "LONG"),
        }
    }
}

/// Fields shared by both analysis-record variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCommon {
    pub title: String,
    pub icon: String,
    pub content: String,
    pub project_name: Option<String>,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub preserved_flag: bool,
    pub word_count: usize,
    pub manual_review_flag: bool,
    pub metadata: HashMap<String, String>,
    pub store_entry_id: Option<String>,
}

/// Task-shaped analysis payload — carries scheduling fields notes don't have.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    #[serde(flatten)]
    pub common: AnalysisCommon,
    pub due_date: Option<DateTime<Utc>>,
    pub duration_category: DurationCategory,
}

/// Note-shaped analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    #[serde(flatten)]
    pub common: AnalysisCommon,
}

/// Output of Stage 4 for one transcript, or one sub-task of a multi-task
/// transcript (spec §3 `AnalysisRecord`).
///
/// Modeled as a tagged union rather than one struct with optional
/// task-only fields (`due_date`, `duration_category`), per the redesign
/// guidance in spec §9 ("dynamic tagged dicts -> sum types").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum AnalysisRecord {
    Task(TaskRecord),
    Note(NoteRecord),
}

impl AnalysisRecord {
    pub fn category(&self) -> Category {
        match self {
            AnalysisRecord::Task(_) => Category::Task,
            AnalysisRecord::Note(_) => Category::Note,
        }
    }

    pub fn common(&self) -> &AnalysisCommon {
        match self {
            AnalysisRecord::Task(t) => &t.common,
            AnalysisRecord::Note(n) => &n.common,
        }
    }

    pub fn common_mut(&mut self) -> &mut AnalysisCommon {
        match self {
            AnalysisRecord::Task(t) => &mut t.common,
            AnalysisRecord::Note(n) => &mut n.common,
        }
    }

    pub fn store_entry_id(&self) -> Option<&str> {
        self.common().store_entry_id.as_deref()
    }

    pub fn set_store_entry_id(&mut self, id: String) {
        self.common_mut().store_entry_id = Some(id);
    }

    pub fn is_committed(&self) -> bool {
        self.common().store_entry_id.is_some()
    }
}

/// One project's full catalog data (spec §3 `ProjectCatalog`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectData {
    pub name: String,
    pub store_id: String,
    pub aliases: Vec<String>,
    pub status: String,
    pub archived: bool,
}

/// Bookkeeping for the catalog's own freshness (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub last_fetch: Option<DateTime<Utc>>,
    pub source: String,
    pub total: usize,
    pub fetch_duration_ms: u64,
    pub failed_attempts: u32,
}

impl Default for CatalogMetadata {
    fn default() -> Self {
        Self {
            last_fetch: None,
            source: "uninitialized".to_string(),
            total: 0,
            fetch_duration_ms: 0,
            failed_attempts: 0,
        }
    }
}

/// In-memory, file-backed cache of projects used by the fuzzy matcher
/// (spec §3 `ProjectCatalog`, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProjectCatalog {
    pub projects: HashMap<String, ProjectData>,
    pub aliases: HashMap<String, String>,
    pub metadata: CatalogMetadata,
}

/// Hard-coded fallback used only when the store and the cache file are both
/// unavailable (spec §9 supplemental, grounded in `project_cache.py`).
pub const FALLBACK_PROJECTS: &[&str] = &["Life Admin HQ", "General", "Inbox"];

impl ProjectCatalog {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn age(&self) -> Option<chrono::Duration> {
        self.metadata.last_fetch.map(|t| Utc::now() - t)
    }

    pub fn fallback() -> Self {
        let mut projects = HashMap::new();
        for name in FALLBACK_PROJECTS {
            projects.insert(
                name.to_string(),
                ProjectData {
                    name: name.to_string(),
                    store_id: String::new(),
                    aliases: Vec::new(),
                    status: "unknown".to_string(),
                    archived: false,
                },
            );
        }
        Self {
            projects,
            aliases: HashMap::new(),
            metadata: CatalogMetadata { source: "fallback".to_string(), ..Default::default() },
        }
    }
}

/// Kind of match the fuzzy matcher found (spec §4.6 fuzzy-matcher table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    ExactName,
    ExactAlias,
    PartialName,
    PartialAlias,
    Fuzzy,
    None,
}

/// Ranked candidate produced by the resolver; never persisted (spec §3 `FuzzyMatch`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyMatch {
    pub matched_project_name: Option<String>,
    pub confidence: f64,
    pub match_type: MatchType,
    pub source_string: String,
}

impl FuzzyMatch {
    pub fn none(source_string: impl Into<String>) -> Self {
        Self {
            matched_project_name: None,
            confidence: 0.0,
            match_type: MatchType::None,
            source_string: source_string.into(),
        }
    }
}

/// Where an archived session's audio will end up, decided at session open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivePlan {
    pub target_folder: String,
    pub retention_date: DateTime<Utc>,
}

/// One entry in a per-stage failure list, with a one-line human reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedEntry {
    pub identifier: String,
    pub reason: String,
}

impl FailedEntry {
    pub fn new(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), reason: reason.into() }
    }
}

/// Summary banner counts the orchestrator prints after each stage (spec §7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct StageSummary {
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl StageSummary {
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.successful as f64 / self.total as f64
        }
    }
}

/// A process-level run of the full six-stage pipeline (spec §3 `Session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    pub recordings_processed: Vec<String>,
    pub transcripts_created: Vec<String>,
    pub ai_processing_success: Vec<String>,
    pub ai_processing_failed: Vec<FailedEntry>,
    pub failed_transcriptions: Vec<String>,
    pub notion_success: Vec<String>,
    pub duplicate_cleanup_candidates: Vec<String>,
    pub archived_recordings: Vec<String>,
    pub failed_entries: Vec<FailedEntry>,
    pub cleanup_failures: Vec<FailedEntry>,

    pub active_backend: Option<String>,
    pub archive_plan: Option<ArchivePlan>,
    pub cleanup_ready: bool,
}

impl Session {
    /// Build a new session id in the `session_YYYYMMDD_HHMMSS` format.
    pub fn new_id(now: DateTime<Utc>) -> String {
        format!("session_{}", now.format("%Y%m%d_%H%M%S"))
    }

    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Self::new_id(now),
            started_at: now,
            ended_at: None,
            recordings_processed: Vec::new(),
            transcripts_created: Vec::new(),
            ai_processing_success: Vec::new(),
            ai_processing_failed: Vec::new(),
            failed_transcriptions: Vec::new(),
            notion_success: Vec::new(),
            duplicate_cleanup_candidates: Vec::new(),
            archived_recordings: Vec::new(),
            failed_entries: Vec::new(),
            cleanup_failures: Vec::new(),
            active_backend: None,
            archive_plan: None,
            cleanup_ready: false,
        }
    }

    pub fn is_already_processed(&self, filename: &str) -> bool {
        self.recordings_processed.iter().any(|f| f == filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_source_estimated_minutes() {
        let now = Utc::now();
        let source = AudioSource::new("rec.mp3", 1024 * 1024 * 3, now, now);
        assert!((source.estimated_minutes - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_audio_source_stem() {
        let now = Utc::now();
        let source = AudioSource::new("/mnt/rec/FOLDER01/230101_0001.mp3", 1024, now, now);
        assert_eq!(source.stem(), "230101_0001");
    }

    #[test]
    fn test_transcript_word_count() {
        let t = Transcript::new("stem", "one two three".to_string(), "stem.txt");
        assert_eq!(t.word_count, 3);
    }

    #[test]
    fn test_analysis_record_category_and_store_id() {
        let mut record = AnalysisRecord::Task(TaskRecord {
            common: AnalysisCommon {
                title: "Email the plumber".to_string(),
                icon: "✉️".to_string(),
                content: "Email the plumber about repairs".to_string(),
                project_name: Some("Life Admin HQ".to_string()),
                tags: vec![],
                confidence: 0.9,
                preserved_flag: false,
                word_count: 5,
                manual_review_flag: false,
                metadata: HashMap::new(),
                store_entry_id: None,
            },
            due_date: None,
            duration_category: DurationCategory::Quick,
        });

        assert_eq!(record.category(), Category::Task);
        assert!(!record.is_committed());
        record.set_store_entry_id("page-123".to_string());
        assert!(record.is_committed());
        assert_eq!(record.store_entry_id(), Some("page-123"));
    }

    #[test]
    fn test_session_already_processed() {
        let now = Utc::now();
        let mut session = Session::new(now);
        assert!(!session.is_already_processed("rec.mp3"));
        session.recordings_processed.push("rec.mp3".to_string());
        assert!(session.is_already_processed("rec.mp3"));
    }

    #[test]
    fn test_project_catalog_fallback() {
        let catalog = ProjectCatalog::fallback();
        assert!(catalog.projects.contains_key("Life Admin HQ"));
        assert_eq!(catalog.metadata.source, "fallback");
    }

    #[test]
    fn test_stage_summary_success_rate() {
        let summary = StageSummary { total: 4, successful: 3, skipped: 0, failed: 1 };
        assert_eq!(summary.success_rate(), 0.75);

        let empty = StageSummary::default();
        assert_eq!(empty.success_rate(), 1.0);
    }
}
