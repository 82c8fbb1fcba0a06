//! Transcript parser & category detector: the five-tier detector, the
//! multi-task splitter, and content-preservation rules (spec §4.5).

use crate::core::types::{Category, CategoryDecision};
use regex::Regex;

/// Keyword configuration the detector is parameterized over (drawn from
/// `Config::category_detection`).
#[derive(Debug, Clone)]
pub struct CategoryKeywords {
    pub task_keywords: Vec<String>,
    pub note_keywords: Vec<String>,
    pub task_imperative_verbs: Vec<String>,
    pub note_indicators: Vec<String>,
    pub task_intent_patterns: Vec<String>,
    pub calendar_keywords: Vec<String>,
}

/// Five-tier category detector, ordered; first hit wins (spec §4.5).
pub struct CategoryDetector {
    keywords: CategoryKeywords,
}

impl CategoryDetector {
    pub fn new(keywords: CategoryKeywords) -> Self {
        Self { keywords }
    }

    pub fn detect(&self, text: &str) -> CategoryDecision {
        let lower = text.to_lowercase();

        if let Some(category) = self.tier0_explicit_end_metadata(&lower) {
            return CategoryDecision { category, confidence: 1.0, manual_review_flag: false };
        }

        if let Some(category) = self.tier1_explicit_keywords(&lower) {
            return CategoryDecision { category, confidence: 0.9, manual_review_flag: false };
        }

        if self.tier2_task_imperative(&lower) {
            return CategoryDecision { category: Category::Task, confidence: 0.8, manual_review_flag: false };
        }

        if self.contains_any(&lower, &self.keywords.note_indicators) {
            return CategoryDecision { category: Category::Note, confidence: 0.75, manual_review_flag: false };
        }

        if self.contains_any(&lower, &self.keywords.task_intent_patterns) {
            return CategoryDecision { category: Category::Task, confidence: 0.75, manual_review_flag: false };
        }

        if self.contains_any(&lower, &self.keywords.calendar_keywords) {
            return CategoryDecision { category: Category::Task, confidence: 0.7, manual_review_flag: true };
        }

        CategoryDecision { category: Category::Note, confidence: 0.5, manual_review_flag: true }
    }

    /// Tier 0: a standalone `note` or `task` word in the last 20 lines.
    /// `note` is checked first — it outranks `task` when both appear
    /// (spec §3 invariant, Testable Property 6).
    fn tier0_explicit_end_metadata(&self, lower: &str) -> Option<Category> {
        let lines: Vec<&str> = lower.lines().collect();
        let start = lines.len().saturating_sub(20);
        let tail = lines[start..].join("\n");

        let note_re = Regex::new(r"\bnote\b").unwrap();
        let task_re = Regex::new(r"\btask\b").unwrap();

        if note_re.is_match(&tail) {
            return Some(Category::Note);
        }
        if task_re.is_match(&tail) {
            return Some(Category::Task);
        }
        None
    }

    fn tier1_explicit_keywords(&self, lower: &str) -> Option<Category> {
        if self.contains_any(lower, &self.keywords.task_keywords) {
            return Some(Category::Task);
        }
        if self.contains_any(lower, &self.keywords.note_keywords) {
            return Some(Category::Note);
        }
        None
    }

    fn tier2_task_imperative(&self, lower: &str) -> bool {
        let first_word = lower.split_whitespace().next().unwrap_or("");
        if self.keywords.task_imperative_verbs.iter().any(|v| v == first_word) {
            return true;
        }
        self.contains_any(lower, &self.keywords.task_imperative_verbs)
    }

    fn contains_any(&self, haystack: &str, needles: &[String]) -> bool {
        needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
    }
}

/// Split a `task`-classified transcript into ordered sub-task segments when
/// two or more period-delimited segments each contain the task keyword.
/// The trailing marker delimits the shared project name, not a task — the
/// `[:-1]` convention from spec §9's Open Questions / Scenario B.
pub fn split_multi_task(text: &str, task_keyword: &str) -> Vec<String> {
    let parts: Vec<&str> = text.split('.').collect();
    let keyword_lower = task_keyword.to_lowercase();

    let task_indices: Vec<usize> = parts
        .iter()
        .enumerate()
        .filter(|(_, p)| p.to_lowercase().contains(&keyword_lower))
        .map(|(i, _)| i)
        .collect();

    if task_indices.len() < 2 {
        return vec![text.trim().to_string()];
    }

    let marker_indices = &task_indices[..task_indices.len() - 1];

    let mut segments = Vec::new();
    let mut prev_index = 0usize;
    for (i, &marker_index) in marker_indices.iter().enumerate() {
        let span = if i == 0 { &parts[..marker_index] } else { &parts[prev_index + 1..marker_index] };
        let segment = span.join(".").trim().to_string();
        if !segment.is_empty() {
            segments.push(segment);
        }
        prev_index = marker_index;
    }

    segments
}

/// Trim a trailing bare category marker (e.g. `". Task"`/`". Note"`) and
/// whitespace, so preserved content is byte-equal to the original transcript
/// modulo that marker (spec §3 invariant, Testable Property 4).
pub fn trim_trailing_marker(text: &str) -> String {
    let trimmed = text.trim_end();
    let lower = trimmed.to_lowercase();
    for marker in [".task", ". task", ".note", ". note"] {
        if lower.ends_with(marker) {
            return trimmed[..trimmed.len() - marker.len()].trim_end().to_string();
        }
    }
    trimmed.trim_end_matches('.').trim_end().to_string()
}

/// Collapse runs of whitespace and re-break after sentence-ending periods —
/// the only formatting notes ever receive (spec §4.5 "Content preservation").
pub fn light_format(text: &str) -> String {
    let collapsed = Regex::new(r"\s+").unwrap().replace_all(text.trim(), " ").to_string();
    Regex::new(r"\.\s+").unwrap().replace_all(&collapsed, ".\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_keywords() -> CategoryKeywords {
        CategoryKeywords {
            task_keywords: vec!["task".to_string()],
            note_keywords: vec!["note".to_string()],
            task_imperative_verbs: vec!["fix".to_string(), "call".to_string(), "email".to_string()],
            note_indicators: vec!["i noticed".to_string(), "was thinking".to_string()],
            task_intent_patterns: vec!["i need to".to_string(), "i want to".to_string()],
            calendar_keywords: vec!["schedule a meeting".to_string()],
        }
    }

    #[test]
    fn test_tier0_end_metadata_outranks_everything() {
        let detector = CategoryDetector::new(default_keywords());
        let text = "Fix the leaking faucet in the kitchen.\nnote";
        let decision = detector.detect(text);
        assert_eq!(decision.category, Category::Note);
        assert_eq!(decision.confidence, 1.0);
        assert!(!decision.manual_review_flag);
    }

    #[test]
    fn test_tier0_note_outranks_task_when_both_present() {
        let detector = CategoryDetector::new(default_keywords());
        let text = "some content\ntask\nnote";
        let decision = detector.detect(text);
        assert_eq!(decision.category, Category::Note);
    }

    #[test]
    fn test_tier1_explicit_keyword() {
        let detector = CategoryDetector::new(default_keywords());
        let decision = detector.detect("Email the plumber about repairs. Life Admin HQ. Task");
        assert_eq!(decision.category, Category::Task);
        assert_eq!(decision.confidence, 0.9);
    }

    #[test]
    fn test_default_is_note_with_manual_review() {
        let detector = CategoryDetector::new(default_keywords());
        let decision = detector.detect("the weather was nice today");
        assert_eq!(decision.category, Category::Note);
        assert_eq!(decision.confidence, 0.5);
        assert!(decision.manual_review_flag);
    }

    #[test]
    fn test_calendar_keyword_flags_manual_review() {
        let detector = CategoryDetector::new(default_keywords());
        let decision = detector.detect("schedule a meeting with the team next week");
        assert_eq!(decision.category, Category::Task);
        assert!(decision.manual_review_flag);
    }

    #[test]
    fn test_split_multi_task_scenario_b() {
        let text = "Email plumber. Task. Call electrician. Task. Life Admin HQ. Task";
        let segments = split_multi_task(text, "task");
        assert_eq!(segments.len(), 2);
        assert!(segments[0].to_lowercase().contains("email plumber"));
        assert!(segments[1].to_lowercase().contains("call electrician"));
    }

    #[test]
    fn test_split_multi_task_single_marker_is_not_split() {
        let text = "Email the plumber about repairs. Life Admin HQ. Task";
        let segments = split_multi_task(text, "task");
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn test_trim_trailing_marker_strips_inline_marker() {
        assert_eq!(trim_trailing_marker("Email the plumber. Task"), "Email the plumber");
    }

    #[test]
    fn test_trim_trailing_marker_leaves_marker_on_its_own_line_untouched() {
        // Tier 0's end-metadata marker sits on its own line, not inline
        // after a period, so this helper (used for inline ". Task"/". Note"
        // suffixes) should not alter it.
        let text = "A long essay.\nnote";
        assert_eq!(trim_trailing_marker(text), text);
    }

    #[test]
    fn test_light_format_collapses_whitespace() {
        let formatted = light_format("Hello   world.  This is   a note.");
        assert!(formatted.contains("Hello world."));
        assert!(!formatted.contains("   "));
    }
}
