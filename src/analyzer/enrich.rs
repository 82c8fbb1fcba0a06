//! Title generation, tag detection, duration estimation, icon selection,
//! and content formatting (spec §4.7).

use super::llm::{strip_surrounding_quotes, LlmClient};
use crate::core::types::{Category, DurationCategory};
use chrono::{DateTime, Datelike, Utc, Weekday};
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Produce a 4-8 word title via one LLM call; falls back to first-N-words
/// truncation on any failure — title generation must never fail the
/// pipeline (spec §4.7 "Title generation").
pub async fn generate_title(llm: &dyn LlmClient, content: &str, category: Category) -> String {
    let style = match category {
        Category::Task => "a 4-8 word verb-object-context title for this task",
        Category::Note => "a 4-8 word topic/insight title for this note",
    };
    let prompt = format!("Produce {style}. Only output the title, no quotes.\n\n{content}");

    match llm.complete(&prompt, 32).await {
        Ok(text) => strip_surrounding_quotes(&text),
        Err(err) => {
            warn!(%err, "title generation LLM call failed, falling back to truncation");
            fallback_title(content)
        }
    }
}

fn fallback_title(content: &str) -> String {
    content.split_whitespace().take(8).collect::<Vec<_>>().join(" ")
}

/// Result of the duration estimator (spec §4.7 "Duration estimator").
#[derive(Debug, Clone)]
pub struct DurationEstimate {
    pub duration_category: DurationCategory,
    pub estimated_minutes: u32,
    pub due_date: DateTime<Utc>,
    pub reasoning: String,
}

fn next_friday(from: DateTime<Utc>) -> DateTime<Utc> {
    let days_until_friday = (Weekday::Fri.num_days_from_monday() as i64
        - from.weekday().num_days_from_monday() as i64
        + 7)
        % 7;
    let offset = if days_until_friday == 0 { 7 } else { days_until_friday };
    from + chrono::Duration::days(offset)
}

fn end_of_month(from: DateTime<Utc>) -> DateTime<Utc> {
    let (year, month) = if from.month() == 12 { (from.year() + 1, 1) } else { (from.year(), from.month() + 1) };
    let first_of_next = chrono::NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let last_of_this = first_of_next.pred_opt().unwrap();
    DateTime::<Utc>::from_naive_utc_and_offset(last_of_this.and_hms_opt(23, 59, 59).unwrap(), Utc)
}

/// One LLM call per task; safe default `MEDIUM / 20 min / end-of-week` on
/// any failure (spec §4.7).
pub async fn estimate_duration(llm: &dyn LlmClient, content: &str, now: DateTime<Utc>) -> DurationEstimate {
    let prompt = format!(
        "Today is {today}. End of week is {eow}. End of month is {eom}. \
         Classify this task as QUICK (<=2 min, due today), MEDIUM (15-30 min, due end of week), \
         or LONG (hours/days, due end of month). Respond as: CATEGORY|MINUTES|DUE_DATE|REASON\n\n{content}",
        today = now.format("%Y-%m-%d"),
        eow = next_friday(now).format("%Y-%m-%d"),
        eom = end_of_month(now).format("%Y-%m-%d"),
    );

    match llm.complete(&prompt, 128).await {
        Ok(text) => parse_duration_response(&text, now).unwrap_or_else(|| safe_default_duration(now)),
        Err(err) => {
            warn!(%err, "duration estimation LLM call failed, using safe default");
            safe_default_duration(now)
        }
    }
}

fn safe_default_duration(now: DateTime<Utc>) -> DurationEstimate {
    DurationEstimate {
        duration_category: DurationCategory::Medium,
        estimated_minutes: 20,
        due_date: next_friday(now),
        reasoning: "default: LLM unavailable".to_string(),
    }
}

fn parse_duration_response(text: &str, now: DateTime<Utc>) -> Option<DurationEstimate> {
    let mut parts = text.trim().splitn(4, '|');
    let category = match parts.next()?.trim().to_uppercase().as_str() {
        "QUICK" => DurationCategory::Quick,
        "MEDIUM" => DurationCategory::Medium,
        "LONG" => DurationCategory::Long,
        _ => return None,
    };
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let due_raw = parts.next()?.trim();
    let due_date = chrono::NaiveDate::parse_from_str(due_raw, "%Y-%m-%d")
        .ok()
        .map(|d| DateTime::<Utc>::from_naive_utc_and_offset(d.and_hms_opt(23, 59, 59).unwrap(), Utc))
        .unwrap_or_else(|| next_friday(now));
    let reasoning = parts.next().unwrap_or("").trim().to_string();

    Some(DurationEstimate { duration_category: category, estimated_minutes: minutes, due_date, reasoning })
}

/// Keyword-driven tag detector (spec §4.7 "Tag detector"). Tag values are
/// exact store-facing strings so the store doesn't drift.
pub struct TagDetector {
    communications_verbs: Vec<String>,
    person_indicators: Vec<String>,
    partner_decision_keywords: Vec<String>,
}

impl TagDetector {
    pub fn new() -> Self {
        Self {
            communications_verbs: vec!["call".into(), "email".into(), "text".into(), "message".into()],
            person_indicators: vec!["parents".into(), "team".into(), "client".into()],
            partner_decision_keywords: vec!["home remodel".into(), "baby".into(), "major decision".into()],
        }
    }

    pub fn detect(&self, content: &str) -> Vec<String> {
        let lower = content.to_lowercase();
        let mut tags = Vec::new();

        let has_comms_verb = self.communications_verbs.iter().any(|v| lower.contains(v.as_str()));
        let has_person = self.person_indicators.iter().any(|p| lower.contains(p.as_str()));
        if has_comms_verb && has_person {
            tags.push("\u{1F4AC} Communications".to_string());
        }

        if self.partner_decision_keywords.iter().any(|k| lower.contains(k.as_str())) {
            tags.push("\u{1F465} Needs Input From Partner".to_string());
        }

        tags
    }
}

impl Default for TagDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword-to-emoji icon selector, three-tier fallback: content, then
/// title, then simplified project name (spec §4.7 "Icon selector").
pub struct IconSelector {
    patterns: Vec<(Regex, String)>,
    default_icon: String,
}

impl IconSelector {
    /// `mapping` is ordered longest-keyword-first by the caller so "first
    /// longest-keyword hit wins" holds.
    pub fn new(mapping: Vec<(String, String)>, default_icon: impl Into<String>) -> Self {
        let patterns = mapping
            .into_iter()
            .filter_map(|(keyword, icon)| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&keyword))).ok().map(|re| (re, icon))
            })
            .collect();
        Self { patterns, default_icon: default_icon.into() }
    }

    pub fn select(&self, content: &str, title: &str, project_name: Option<&str>) -> String {
        for candidate in [Some(content), Some(title), project_name.map(simplify_project_name).as_deref()] {
            if let Some(candidate) = candidate {
                if let Some(icon) = self.first_match(candidate) {
                    return icon;
                }
            }
        }
        self.default_icon.clone()
    }

    fn first_match(&self, text: &str) -> Option<String> {
        self.patterns.iter().find(|(re, _)| re.is_match(text)).map(|(_, icon)| icon.clone())
    }
}

fn simplify_project_name(name: &str) -> String {
    name.trim_start_matches("Project: ").trim_end_matches(" (Active)").to_string()
}

/// Fixed meta-commentary patterns stripped from task content before any
/// optional LLM cleanup call (spec §4.7 "Content formatter").
const META_COMMENTARY_PATTERNS: &[&str] = &[
    r"(?i)i recorded a message asking you to\s*",
    r"(?i)this is a reminder to\s*",
    r"(?i)note to self[:,]?\s*",
];

/// Remove meta-commentary from task content; confidence decreases with
/// pattern hits (spec §4.7). Does not invoke the LLM itself — that's an
/// optional follow-up call left to the caller.
pub fn strip_meta_commentary(content: &str) -> (String, f64) {
    let mut result = content.to_string();
    let mut hits = 0;
    for pattern in META_COMMENTARY_PATTERNS {
        let re = Regex::new(pattern).unwrap();
        if re.is_match(&result) {
            hits += 1;
            result = re.replace_all(&result, "").to_string();
        }
    }
    let confidence = (1.0 - hits as f64 * 0.1).max(0.5);
    (result.trim().to_string(), confidence)
}

/// Metadata bag carried on every `AnalysisCommon` (e.g. `content_type` for
/// specialized formatter selection, `ai_enhanced` flag).
pub fn base_metadata(ai_enhanced: bool) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("ai_enhanced".to_string(), ai_enhanced.to_string());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubLlm {
        response: Result<String, String>,
    }

    #[async_trait]
    impl LlmClient for StubLlm {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, String> {
            self.response.clone()
        }
    }

    #[tokio::test]
    async fn test_generate_title_falls_back_on_llm_failure() {
        let llm = StubLlm { response: Err("rate limited".to_string()) };
        let title = generate_title(&llm, "Email the plumber about the leaking pipe today", Category::Task).await;
        assert_eq!(title, "Email the plumber about the leaking pipe today");
    }

    #[tokio::test]
    async fn test_generate_title_strips_quotes_on_success() {
        let llm = StubLlm { response: Ok("\"Email the plumber\"".to_string()) };
        let title = generate_title(&llm, "content", Category::Task).await;
        assert_eq!(title, "Email the plumber");
    }

    #[tokio::test]
    async fn test_estimate_duration_safe_default_on_failure() {
        let llm = StubLlm { response: Err("down".to_string()) };
        let now = Utc::now();
        let estimate = estimate_duration(&llm, "content", now).await;
        assert_eq!(estimate.duration_category, DurationCategory::Medium);
        assert_eq!(estimate.estimated_minutes, 20);
    }

    #[test]
    fn test_tag_detector_communications() {
        let detector = TagDetector::new();
        let tags = detector.detect("Call my parents about dinner plans");
        assert!(tags.iter().any(|t| t.contains("Communications")));
    }

    #[test]
    fn test_tag_detector_no_match() {
        let detector = TagDetector::new();
        let tags = detector.detect("Buy groceries for the week");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_icon_selector_content_match() {
        let selector = IconSelector::new(
            vec![("email".to_string(), "\u{2709}\u{FE0F}".to_string())],
            "\u{2049}\u{FE0F}",
        );
        let icon = selector.select("Email the plumber", "title", None);
        assert_eq!(icon, "\u{2709}\u{FE0F}");
    }

    #[test]
    fn test_icon_selector_default_when_no_match() {
        let selector = IconSelector::new(vec![], "\u{2049}\u{FE0F}");
        let icon = selector.select("nothing matches", "title", None);
        assert_eq!(icon, "\u{2049}\u{FE0F}");
    }

    #[test]
    fn test_strip_meta_commentary() {
        let (cleaned, confidence) =
            strip_meta_commentary("I recorded a message asking you to call the bank");
        assert_eq!(cleaned, "call the bank");
        assert!(confidence < 1.0);
    }

    #[test]
    fn test_next_friday_from_monday() {
        let monday = DateTime::parse_from_rfc3339("2026-07-27T00:00:00Z").unwrap().with_timezone(&Utc);
        let friday = next_friday(monday);
        assert_eq!(friday.weekday(), Weekday::Fri);
    }
}
