// src/models/quiz.rs

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::de::{QuestionKey, string_or_number};

/// Quiz content. Owned by the content side; this service only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub quiz_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    pub scoring_framework: ScoringFramework,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub section_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(deserialize_with = "string_or_number")]
    pub question_id: String,

    /// Plain text or a per-language object such as `{"en": ..., "hi": ...}`.
    #[serde(default)]
    pub question: Value,

    #[serde(default)]
    pub options: Vec<Value>,

    #[serde(default)]
    pub category_tag: Option<String>,

    /// Option key -> points awarded when that option is picked.
    #[serde(default)]
    pub weight_mapping: Option<HashMap<String, f64>>,
}

/// How answers turn into category totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringFramework {
    /// Only `categorical_sum` is supported.
    pub method: String,

    /// Category -> question ids, in the order ties are broken.
    #[serde(default)]
    pub categories: IndexMap<String, Vec<QuestionKey>>,

    /// Question id -> option key -> weight.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub weights: HashMap<String, HashMap<String, f64>>,
}

impl ScoringFramework {
    pub fn weight_for(&self, question_id: &str) -> Option<&HashMap<String, f64>> {
        self.weights.get(question_id)
    }
}

/// A question with its section attached, as served to the quiz client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatQuestion {
    pub question_id: String,
    pub section_id: Option<String>,
    pub question: Value,
    pub options: Vec<Value>,
    pub category_tag: Option<String>,
}

/// Response body for `GET /api/quizzes/{quiz_id}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizView {
    pub quiz_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub questions: Vec<FlatQuestion>,
    pub scoring_framework: ScoringFramework,
}

impl Quiz {
    pub fn flatten(&self) -> Vec<FlatQuestion> {
        self.sections
            .iter()
            .flat_map(|section| {
                section.questions.iter().map(move |q| FlatQuestion {
                    question_id: q.question_id.clone(),
                    section_id: section.section_id.clone(),
                    question: q.question.clone(),
                    options: q.options.clone(),
                    category_tag: q.category_tag.clone(),
                })
            })
            .collect()
    }

    pub fn question_count(&self) -> usize {
        self.sections.iter().map(|s| s.questions.len()).sum()
    }

    /// The framework with per-question weight mappings folded in.
    ///
    /// Weights declared on the framework itself take precedence over the
    /// ones attached to individual questions.
    pub fn effective_framework(&self) -> ScoringFramework {
        let mut framework = self.scoring_framework.clone();
        for question in self.sections.iter().flat_map(|s| s.questions.iter()) {
            if let Some(mapping) = &question.weight_mapping {
                framework
                    .weights
                    .entry(question.question_id.clone())
                    .or_insert_with(|| mapping.clone());
            }
        }
        framework
    }

    pub fn view(&self) -> QuizView {
        QuizView {
            quiz_id: self.quiz_id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            questions: self.flatten(),
            scoring_framework: self.scoring_framework.clone(),
        }
    }
}
