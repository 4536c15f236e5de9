// src/services/scoring.rs

use indexmap::IndexMap;

use crate::{
    config::DEFAULT_TOP_CATEGORY,
    models::{answer::CanonicalAnswer, quiz::ScoringFramework, result::ScoreSummary},
};

pub const CATEGORICAL_SUM: &str = "categorical_sum";
const WEIGHTED_SUM: &str = "weighted_sum";
const NO_ANSWERS: &str = "default";

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Unsupported scoring method: {0}")]
    UnsupportedMethod(String),
}

/// Scores canonical answers against a framework.
///
/// Deterministic: identical inputs always give identical totals and the
/// same top category.
pub fn calculate_score(
    answers: &[CanonicalAnswer],
    framework: &ScoringFramework,
) -> Result<ScoreSummary, ScoringError> {
    match framework.method.as_str() {
        CATEGORICAL_SUM => Ok(categorical_sum(answers, framework)),
        other => {
            tracing::error!("Scoring failed: unsupported method '{}'", other);
            Err(ScoringError::UnsupportedMethod(other.to_string()))
        }
    }
}

fn categorical_sum(answers: &[CanonicalAnswer], framework: &ScoringFramework) -> ScoreSummary {
    let mut totals: IndexMap<String, f64> = framework
        .categories
        .keys()
        .map(|name| (name.clone(), 0.0))
        .collect();

    if answers.is_empty() {
        tracing::warn!("No answers to score, returning zeroed categories");
        return ScoreSummary {
            categories: totals,
            top_category: DEFAULT_TOP_CATEGORY.to_string(),
            method_used: NO_ANSWERS.to_string(),
            total: 0.0,
        };
    }

    // Only set once mapped points actually land in a category.
    let mut weighted = false;
    for answer in answers {
        let mapping = framework.weight_for(&answer.question_id);
        let points = mapping
            .and_then(|m| m.get(&answer.selected_option).copied())
            .unwrap_or(1.0);

        for (category, question_ids) in framework.categories.iter() {
            if question_ids.iter().any(|q| q.as_str() == answer.question_id) {
                if let Some(total) = totals.get_mut(category) {
                    *total += points;
                    weighted |= mapping.is_some();
                }
            }
        }
    }

    let top_category = top_category(&totals);
    let total: f64 = totals.iter().map(|(_, points)| points).sum();
    tracing::debug!("Scored {} answers, top category {}", answers.len(), top_category);

    ScoreSummary {
        categories: totals,
        top_category,
        method_used: if weighted { WEIGHTED_SUM } else { CATEGORICAL_SUM }.to_string(),
        total,
    }
}

/// Strictly highest total wins; on a tie the earlier category keeps the lead.
fn top_category(totals: &IndexMap<String, f64>) -> String {
    let mut best: Option<(&str, f64)> = None;
    for (name, points) in totals.iter() {
        if best.is_none_or(|(_, lead)| *points > lead) {
            best = Some((name.as_str(), *points));
        }
    }
    best.map(|(name, _)| name.to_string())
        .unwrap_or_else(|| DEFAULT_TOP_CATEGORY.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn framework(value: serde_json::Value) -> ScoringFramework {
        serde_json::from_value(value).unwrap()
    }

    fn answers(pairs: &[(&str, &str)]) -> Vec<CanonicalAnswer> {
        pairs.iter().map(|(q, o)| CanonicalAnswer::new(*q, *o)).collect()
    }

    #[test]
    fn test_counts_one_point_per_answer() {
        let fw = framework(json!({
            "method": "categorical_sum",
            "categories": {"logic": [1, 2], "people": [3]}
        }));
        let summary = calculate_score(&answers(&[("1", "a"), ("2", "b"), ("3", "a")]), &fw).unwrap();
        assert_eq!(summary.categories.get("logic"), Some(&2.0));
        assert_eq!(summary.categories.get("people"), Some(&1.0));
        assert_eq!(summary.top_category, "logic");
        assert_eq!(summary.method_used, "categorical_sum");
        assert_eq!(summary.total, 3.0);
    }

    #[test]
    fn test_weights_apply_per_option() {
        let mut fw = framework(json!({
            "method": "categorical_sum",
            "categories": {"logic": ["1"], "people": ["2"]}
        }));
        fw.weights.insert(
            "2".to_string(),
            [("a".to_string(), 4.0), ("b".to_string(), 0.5)].into_iter().collect(),
        );
        let summary = calculate_score(&answers(&[("1", "a"), ("2", "a")]), &fw).unwrap();
        assert_eq!(summary.categories.get("people"), Some(&4.0));
        assert_eq!(summary.top_category, "people");
        assert_eq!(summary.method_used, "weighted_sum");

        // An option missing from the mapping still counts one point.
        let summary = calculate_score(&answers(&[("2", "z")]), &fw).unwrap();
        assert_eq!(summary.categories.get("people"), Some(&1.0));
    }

    #[test]
    fn test_weights_outside_categories_do_not_mark_weighted() {
        let mut fw = framework(json!({
            "method": "categorical_sum",
            "categories": {"logic": ["1"]}
        }));
        fw.weights.insert("9".to_string(), [("a".to_string(), 5.0)].into_iter().collect());

        let summary = calculate_score(&answers(&[("1", "a"), ("9", "a")]), &fw).unwrap();
        assert_eq!(summary.method_used, "categorical_sum");
        assert_eq!(summary.total, 1.0);
    }

    #[test]
    fn test_ties_go_to_first_category() {
        let fw = framework(json!({
            "method": "categorical_sum",
            "categories": {"zeta": ["1"], "alpha": ["2"]}
        }));
        let summary = calculate_score(&answers(&[("2", "a"), ("1", "a")]), &fw).unwrap();
        assert_eq!(summary.top_category, "zeta");
    }

    #[test]
    fn test_zero_answers_do_not_fail() {
        let fw = framework(json!({
            "method": "categorical_sum",
            "categories": {"logic": ["1"], "people": ["2"]}
        }));
        let summary = calculate_score(&[], &fw).unwrap();
        assert_eq!(summary.top_category, "General");
        assert_eq!(summary.method_used, "default");
        assert_eq!(summary.categories.len(), 2);
        assert!(summary.categories.iter().all(|(_, p)| *p == 0.0));
    }

    #[test]
    fn test_no_categories_reports_general() {
        let fw = framework(json!({"method": "categorical_sum"}));
        let summary = calculate_score(&answers(&[("1", "a")]), &fw).unwrap();
        assert_eq!(summary.top_category, "General");
        assert_eq!(summary.total, 0.0);
    }

    #[test]
    fn test_unsupported_method_fails() {
        let fw = framework(json!({"method": "median", "categories": {"a": ["1"]}}));
        let err = calculate_score(&answers(&[("1", "a")]), &fw).unwrap_err();
        assert!(matches!(err, ScoringError::UnsupportedMethod(ref m) if m == "median"));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let fw = framework(json!({
            "method": "categorical_sum",
            "categories": {"a": ["1", "3"], "b": ["2", "4"], "c": ["5"]}
        }));
        let input = answers(&[("1", "x"), ("2", "y"), ("3", "x"), ("4", "y"), ("5", "z")]);
        let first = calculate_score(&input, &fw).unwrap();
        for _ in 0..20 {
            assert_eq!(calculate_score(&input, &fw).unwrap(), first);
        }
        assert_eq!(first.top_category, "a");
    }
}
