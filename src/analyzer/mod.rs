//! Analyzer: classifies a transcript, splits multi-task content, extracts
//! title/project/tags/icon, and commits each record to the document store
//! (spec §4.7, Stage 4 overall in §2).

pub mod enrich;
pub mod llm;

use crate::core::types::{
    AnalysisCommon, AnalysisRecord, Category, NoteRecord, ProjectCatalog, TaskRecord, Transcript,
};
use crate::parser::{light_format, split_multi_task, trim_trailing_marker, CategoryDetector};
use crate::resolver::extract_project;
use chrono::Utc;
use enrich::{base_metadata, estimate_duration, generate_title, strip_meta_commentary, IconSelector, TagDetector};
use llm::LlmClient;
use std::sync::Arc;
use tracing::info;

pub struct AnalyzerConfig {
    pub preservation_threshold: usize,
    pub task_excerpt_words: usize,
    pub note_excerpt_words: usize,
}

/// Turns one transcript into one or more `AnalysisRecord`s (spec §4.5-§4.7
/// combined — classification, splitting, enrichment). The LLM client is
/// explicitly injected rather than a global singleton (spec §9).
pub struct Analyzer {
    detector: CategoryDetector,
    llm: Arc<dyn LlmClient>,
    tag_detector: TagDetector,
    icon_selector: IconSelector,
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(
        detector: CategoryDetector,
        llm: Arc<dyn LlmClient>,
        icon_selector: IconSelector,
        config: AnalyzerConfig,
    ) -> Self {
        Self { detector, llm, tag_detector: TagDetector::new(), icon_selector, config }
    }

    /// Produce the ordered list of `AnalysisRecord`s for one transcript.
    /// Multi-task transcripts yield one record per sub-task, in textual
    /// order (spec §3, §4.5, Testable Property 5).
    pub async fn analyze(&self, transcript: &Transcript, catalog: &ProjectCatalog) -> Vec<AnalysisRecord> {
        let decision = self.detector.detect(&transcript.text);

        match decision.category {
            Category::Task => {
                let segments = split_multi_task(&transcript.text, "task");
                let mut records = Vec::with_capacity(segments.len());
                for segment in segments {
                    records.push(
                        self.build_task_record(&segment, &transcript.text, decision, catalog).await,
                    );
                }
                records
            }
            Category::Note => {
                vec![self.build_note_record(&transcript.text, decision, catalog).await]
            }
        }
    }

    async fn build_task_record(
        &self,
        segment: &str,
        full_text: &str,
        decision: crate::core::types::CategoryDecision,
        catalog: &ProjectCatalog,
    ) -> AnalysisRecord {
        let word_count = segment.split_whitespace().count();
        let preserved = word_count > self.config.preservation_threshold;

        let (content, confidence_adjust) = if preserved {
            (trim_trailing_marker(segment), 1.0)
        } else {
            strip_meta_commentary(segment)
        };

        let title_source = excerpt(&content, self.config.task_excerpt_words);
        let title = generate_title(self.llm.as_ref(), &title_source, Category::Task).await;

        let project_match = extract_project(full_text, "task", catalog);
        let manual_review = decision.manual_review_flag || project_match.confidence < 0.95;

        let duration = estimate_duration(self.llm.as_ref(), &content, Utc::now()).await;
        let tags = self.tag_detector.detect(&content);
        let icon = self.icon_selector.select(&content, &title, project_match.matched_project_name.as_deref());

        AnalysisRecord::Task(TaskRecord {
            common: AnalysisCommon {
                title,
                icon,
                content,
                project_name: project_match.matched_project_name,
                tags,
                confidence: (decision.confidence * confidence_adjust).min(1.0),
                preserved_flag: preserved,
                word_count,
                manual_review_flag: manual_review,
                metadata: base_metadata(!preserved),
                store_entry_id: None,
            },
            due_date: Some(duration.due_date),
            duration_category: duration.duration_category,
        })
    }

    async fn build_note_record(
        &self,
        text: &str,
        decision: crate::core::types::CategoryDecision,
        catalog: &ProjectCatalog,
    ) -> AnalysisRecord {
        let word_count = text.split_whitespace().count();
        let preserved = word_count > self.config.preservation_threshold;

        // Notes are never summarized by the LLM; only light formatting.
        let content = if preserved { trim_trailing_marker(text) } else { light_format(text) };

        let title_source = excerpt(&content, self.config.note_excerpt_words);
        let title = generate_title(self.llm.as_ref(), &title_source, Category::Note).await;

        let project_match = extract_project(text, "note", catalog);
        let tags = self.tag_detector.detect(&content);
        let icon = self.icon_selector.select(&content, &title, project_match.matched_project_name.as_deref());

        info!(preserved, word_count, "note analyzed");

        AnalysisRecord::Note(NoteRecord {
            common: AnalysisCommon {
                title,
                icon,
                content,
                project_name: project_match.matched_project_name,
                tags,
                confidence: decision.confidence,
                preserved_flag: preserved,
                word_count,
                manual_review_flag: decision.manual_review_flag,
                metadata: base_metadata(!preserved),
                store_entry_id: None,
            },
        })
    }
}

fn excerpt(text: &str, max_words: usize) -> String {
    text.split_whitespace().take(max_words).collect::<Vec<_>>().join(" ")
}
