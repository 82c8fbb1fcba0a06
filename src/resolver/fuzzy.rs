//! Fuzzy project matcher + project extraction from transcript content
//! (spec §4.6 "Project extraction from content" / "Fuzzy matcher").

use crate::core::types::{FuzzyMatch, MatchType, ProjectCatalog};

/// Keywords ignored as candidate project names — they're the category
/// markers themselves, not a project (spec §4.6 step 2, Testable Property 14).
pub const IGNORED_PROJECT_KEYWORDS: &[&str] =
    &["task", "note", "project", "tasks", "notes", "projects"];

const FUZZY_THRESHOLD_DEFAULT: f64 = 0.6;
const ACCEPT_THRESHOLD: f64 = 0.95;

fn normalize_word(word: &str) -> String {
    let lower = word.to_lowercase();
    match lower.as_str() {
        "1st" => "first".to_string(),
        "2nd" => "second".to_string(),
        "3rd" => "third".to_string(),
        "4th" => "fourth".to_string(),
        "5th" => "fifth".to_string(),
        _ => lower,
    }
}

fn normalize_phrase(phrase: &str) -> String {
    phrase.split_whitespace().map(normalize_word).collect::<Vec<_>>().join(" ")
}

fn is_ignored_phrase(phrase: &str) -> bool {
    let normalized = normalize_phrase(phrase);
    let words: Vec<&str> = normalized.split_whitespace().collect();
    words.iter().all(|w| IGNORED_PROJECT_KEYWORDS.contains(w))
}

/// Longest-common-subsequence length, used for the level-5 character
/// similarity ratio.
fn lcs_len(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            if a[i - 1] == b[j - 1] {
                dp[i][j] = dp[i - 1][j - 1] + 1;
            } else {
                dp[i][j] = dp[i - 1][j].max(dp[i][j - 1]);
            }
        }
    }
    dp[a.len()][b.len()]
}

fn lcs_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let lcs = lcs_len(a, b) as f64;
    lcs / a.len().max(b.len()) as f64
}

/// Fraction of candidate words found (exactly, or as a substring for
/// tokens >= 3 chars) in `target`'s word set (spec §4.6 levels 3-4).
fn partial_word_overlap(candidate: &str, target: &str) -> f64 {
    let candidate_words: Vec<String> = normalize_phrase(candidate).split_whitespace().map(String::from).collect();
    if candidate_words.is_empty() {
        return 0.0;
    }
    let target_norm = normalize_phrase(target);
    let target_words: Vec<&str> = target_norm.split_whitespace().collect();

    let matched = candidate_words
        .iter()
        .filter(|cw| {
            target_words.iter().any(|tw| {
                tw == cw || (cw.len() >= 3 && tw.contains(cw.as_str())) || (tw.len() >= 3 && cw.contains(tw))
            })
        })
        .count();

    matched as f64 / candidate_words.len() as f64
}

/// Rank `candidate` against the whole catalog; returns the single
/// highest-confidence match across all five levels (spec §4.6).
pub fn fuzzy_match(candidate: &str, catalog: &ProjectCatalog) -> FuzzyMatch {
    let candidate_norm = normalize_phrase(candidate);
    if candidate_norm.is_empty() {
        return FuzzyMatch::none(candidate);
    }

    // Level 1: case-insensitive exact name (short-circuit).
    for project in catalog.projects.values() {
        if normalize_phrase(&project.name) == candidate_norm {
            return FuzzyMatch {
                matched_project_name: Some(project.name.clone()),
                confidence: 1.00,
                match_type: MatchType::ExactName,
                source_string: candidate.to_string(),
            };
        }
    }

    let mut best = FuzzyMatch::none(candidate);

    for project in catalog.projects.values() {
        // Level 2: case-insensitive exact alias.
        if project.aliases.iter().any(|a| normalize_phrase(a) == candidate_norm) {
            if 0.95 > best.confidence {
                best = FuzzyMatch {
                    matched_project_name: Some(project.name.clone()),
                    confidence: 0.95,
                    match_type: MatchType::ExactAlias,
                    source_string: candidate.to_string(),
                };
            }
            continue;
        }

        // Level 3: partial word overlap vs project name.
        let name_overlap = partial_word_overlap(candidate, &project.name);
        if name_overlap >= 0.70 {
            let confidence = 0.80 + name_overlap.min(1.0) * 0.10;
            if confidence > best.confidence {
                best = FuzzyMatch {
                    matched_project_name: Some(project.name.clone()),
                    confidence,
                    match_type: MatchType::PartialName,
                    source_string: candidate.to_string(),
                };
            }
        }

        // Level 4: partial word overlap vs alias.
        for alias in &project.aliases {
            let alias_overlap = partial_word_overlap(candidate, alias);
            if alias_overlap >= 0.70 {
                let confidence = 0.75 + alias_overlap.min(1.0) * 0.10;
                if confidence > best.confidence {
                    best = FuzzyMatch {
                        matched_project_name: Some(project.name.clone()),
                        confidence,
                        match_type: MatchType::PartialAlias,
                        source_string: candidate.to_string(),
                    };
                }
            }
        }

        // Level 5: character-level LCS similarity.
        let ratio = lcs_ratio(&candidate_norm, &normalize_phrase(&project.name));
        if ratio >= FUZZY_THRESHOLD_DEFAULT {
            let confidence = ratio * 0.70;
            if confidence > best.confidence {
                best = FuzzyMatch {
                    matched_project_name: Some(project.name.clone()),
                    confidence,
                    match_type: MatchType::Fuzzy,
                    source_string: candidate.to_string(),
                };
            }
        }
    }

    best
}

/// Extract a project name from transcript content (spec §4.6 "Project
/// extraction from content"):
/// 1. Find the last occurrence of the category keyword; consider only
///    text before it.
/// 2. Try sliding 1-5 word windows from the end, longest first, skipping
///    pure-ignored-keyword windows.
/// 3. Accept the first window whose confidence >= 0.95; else remember the
///    best.
/// 4. If nothing reaches the threshold, return `Manual Review Required`
///    with confidence 0.0 (Testable Property 14).
pub fn extract_project(text: &str, category_keyword: &str, catalog: &ProjectCatalog) -> FuzzyMatch {
    let lower = text.to_lowercase();
    let keyword_lower = category_keyword.to_lowercase();

    let Some(last_index) = lower.rfind(&keyword_lower) else {
        return FuzzyMatch::none(text);
    };

    let prefix = &text[..last_index];
    let words: Vec<&str> = prefix.split_whitespace().collect();
    if words.is_empty() {
        return manual_review_required(text);
    }

    let mut best = FuzzyMatch::none(text);

    for window_size in (1..=5usize.min(words.len())).rev() {
        let window = words[words.len() - window_size..].join(" ");
        let cleaned = window.trim_matches(|c: char| c == '.' || c == ',').to_string();
        if cleaned.is_empty() || is_ignored_phrase(&cleaned) {
            continue;
        }

        let candidate_match = fuzzy_match(&cleaned, catalog);
        if candidate_match.confidence >= ACCEPT_THRESHOLD {
            return candidate_match;
        }
        if candidate_match.confidence > best.confidence {
            best = candidate_match;
        }
    }

    if best.confidence > 0.0 {
        best
    } else {
        manual_review_required(text)
    }
}

fn manual_review_required(source_string: &str) -> FuzzyMatch {
    FuzzyMatch {
        matched_project_name: None,
        confidence: 0.0,
        match_type: MatchType::None,
        source_string: source_string.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ProjectData;

    fn catalog() -> ProjectCatalog {
        let mut catalog = ProjectCatalog::default();
        catalog.projects.insert(
            "Life Admin HQ".to_string(),
            ProjectData {
                name: "Life Admin HQ".to_string(),
                store_id: "p1".to_string(),
                aliases: vec!["life admin".to_string()],
                status: "In progress".to_string(),
                archived: false,
            },
        );
        catalog
    }

    #[test]
    fn test_exact_name_match_short_circuits() {
        let result = fuzzy_match("Life Admin HQ", &catalog());
        assert_eq!(result.match_type, MatchType::ExactName);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_exact_alias_match() {
        let result = fuzzy_match("life admin", &catalog());
        assert_eq!(result.match_type, MatchType::ExactAlias);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn test_no_match_returns_none_type() {
        let result = fuzzy_match("something totally unrelated", &catalog());
        assert_eq!(result.match_type, MatchType::None);
    }

    #[test]
    fn test_extract_project_scenario_a() {
        let text = "Email the plumber about repairs. Life Admin HQ. Task";
        let result = extract_project(text, "task", &catalog());
        assert_eq!(result.matched_project_name.as_deref(), Some("Life Admin HQ"));
    }

    #[test]
    fn test_extract_project_task_alone_is_manual_review() {
        // Testable Property 14: project extraction of "task" alone -> no match.
        let result = extract_project("task", "task", &catalog());
        assert_eq!(result.match_type, MatchType::None);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_ordinal_normalization() {
        assert_eq!(normalize_word("2nd"), "second");
        assert_eq!(normalize_word("1st"), "first");
    }
}
