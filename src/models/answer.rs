// src/models/answer.rs

use serde::{Deserialize, Serialize};

/// An answer after normalization: both fields are always non-empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalAnswer {
    pub question_id: String,
    pub selected_option: String,
}

impl CanonicalAnswer {
    pub fn new(question_id: impl Into<String>, selected_option: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            selected_option: selected_option.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.question_id.trim().is_empty() && !self.selected_option.trim().is_empty()
    }
}

/// A rejected item from a finalize payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizationIssue {
    pub index: usize,
    pub reason: String,
}
