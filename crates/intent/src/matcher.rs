//! Fuzzy tool matcher: scores a user utterance against every registered
//! tool's metadata and returns the best candidate(s).
//!
//! Score is the sum of four independent terms:
//! keyword overlap (≤40), Ratcliff/Obershelp string similarity against the
//! tool's description (≤30), similarity against the tool's normalised name
//! (≤20), and a category-keyword bonus (≤10). Total range is 0-100.

use crate::types::{ToolMatch, ToolMetadata};
use std::collections::HashSet;

/// Minimum score for `ToolRegistry::get_best_match` to return a candidate at
/// all — below this, the utterance isn't meaningfully close to any tool.
pub const MIN_MATCH_SCORE: f64 = 20.0;

/// Minimum score for the classifier's action-verb branch to promote a
/// match all the way to a `ToolAction` intent rather than falling back to
/// conversation. The bare domain-keyword fallback branch uses the lower
/// [`MIN_MATCH_SCORE`] instead — it has no action verb to lean on, so it
/// accepts the same routing-default confidence `get_best_match` already
/// requires.
pub const CLASSIFIER_ACTION_THRESHOLD: f64 = 50.0;

pub fn score(utterance: &str, tool: &ToolMetadata) -> f64 {
    let normalized = normalize(utterance);
    let keyword = keyword_overlap_score(&normalized, tool);
    let desc = similarity(&normalized, &normalize(&tool.description)) * 30.0;
    let name = similarity(&normalized, &normalize(&tool.name.replace('_', " "))) * 20.0;
    let category = category_bonus(&normalized, tool);
    keyword + desc + name + category
}

/// Score every tool and return them sorted descending by score.
pub fn rank<'a>(utterance: &str, tools: impl Iterator<Item = &'a ToolMetadata>) -> Vec<ToolMatch> {
    let mut scored: Vec<ToolMatch> = tools
        .map(|t| ToolMatch {
            tool_name: t.name.clone(),
            score: score(utterance, t),
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn keyword_overlap_score(normalized_utterance: &str, tool: &ToolMetadata) -> f64 {
    if tool.action_keywords.is_empty() {
        return 0.0;
    }
    let words: HashSet<&str> = normalized_utterance.split_whitespace().collect();
    let hits = tool
        .action_keywords
        .iter()
        .filter(|kw| {
            let kw_norm = kw.to_lowercase();
            words.contains(kw_norm.as_str()) || normalized_utterance.contains(&kw_norm)
        })
        .count();
    // Each matched keyword is worth 20pts; two or more hits already saturate
    // the term, so a single strong signal word still counts for something.
    (hits as f64 * 20.0).min(40.0)
}

fn category_bonus(normalized_utterance: &str, tool: &ToolMetadata) -> f64 {
    let category = tool.category.to_lowercase();
    if normalized_utterance.contains(&category) {
        10.0
    } else {
        0.0
    }
}

/// Ratcliff/Obershelp similarity ratio: `2 * M / T` where `M` is the total
/// length of matching blocks found by recursively taking the longest common
/// substring, and `T` is the combined length of both strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let matches = matching_chars(&a_chars, &b_chars);
    (2.0 * matches as f64) / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i1, j1, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    let mut total = len;
    total += matching_chars(&a[..i1], &b[..j1]);
    total += matching_chars(&a[i1 + len..], &b[j1 + len..]);
    total
}

/// Returns (start index in a, start index in b, length) of the longest
/// common contiguous run of chars.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    if a.is_empty() || b.is_empty() {
        return (0, 0, 0);
    }
    let mut best = (0usize, 0usize, 0usize);
    let mut prev_row = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut cur_row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let len = prev_row[j] + 1;
                cur_row[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            }
        }
        prev_row = cur_row;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alarm_tool() -> ToolMetadata {
        ToolMetadata::new(
            "set_alarm",
            "Set an alarm for a specific time",
            "alarms",
            &["set", "alarm", "wake"],
            &["time"],
            json!({"type": "object", "properties": {"time": {"type": "string"}}}),
        )
    }

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("wake me up", "wake me up"), 1.0);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn exact_keyword_hit_scores_high() {
        let tool = alarm_tool();
        let s = score("set an alarm for 7am", &tool);
        assert!(s >= CLASSIFIER_ACTION_THRESHOLD, "score was {s}");
    }

    #[test]
    fn unrelated_utterance_scores_below_action_threshold() {
        let tool = alarm_tool();
        let s = score("tell me a joke about cats", &tool);
        assert!(s < CLASSIFIER_ACTION_THRESHOLD, "score was {s}");
    }

    #[test]
    fn rank_orders_descending() {
        let alarm = alarm_tool();
        let weather = ToolMetadata::new(
            "get_weather",
            "Get the current weather forecast",
            "search",
            &["weather", "forecast"],
            &[],
            json!({"type": "object", "properties": {}}),
        );
        let tools = vec![alarm, weather];
        let ranked = rank("what's the weather like today", tools.iter());
        assert_eq!(ranked[0].tool_name, "get_weather");
    }
}
