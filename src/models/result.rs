// src/models/result.rs

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::answer::CanonicalAnswer;

/// Output of the scoring engine, stored on the attempt and copied into the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSummary {
    /// Points per category, in scoring framework order.
    pub categories: IndexMap<String, f64>,
    pub top_category: String,
    pub method_used: String,
    /// Sum of all category points.
    pub total: f64,
}

/// Calculation details kept next to the summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawScore {
    pub answers: Vec<CanonicalAnswer>,
    pub score: f64,
}

/// Everything needed to persist a result except the token, which the
/// result service assigns.
#[derive(Debug, Clone)]
pub struct NewResult {
    pub quiz_id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub summary: ScoreSummary,
    pub raw: RawScore,
    pub attempt_id: Uuid,
}

/// Represents a persisted, immutable quiz result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: Uuid,
    pub quiz_id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub summary: ScoreSummary,
    pub raw: RawScore,
    pub attempt_id: Uuid,

    /// Always set for results written by this service. Older rows may lack it.
    pub result_token: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl QuizResult {
    pub fn from_new(new: NewResult, result_token: String) -> Self {
        QuizResult {
            id: Uuid::new_v4(),
            quiz_id: new.quiz_id,
            user_id: new.user_id,
            email: new.email,
            name: new.name,
            phone: new.phone,
            summary: new.summary,
            raw: new.raw,
            attempt_id: new.attempt_id,
            result_token: Some(result_token),
            created_at: Utc::now(),
        }
    }
}

/// Query parameters for `GET /api/quizzes/results`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResultLookupQuery {
    #[validate(length(min = 1, message = "Email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "quizId is required"))]
    pub quiz_id: String,
}

/// Public view of a result (phone and internal ids stay private).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub quiz_id: String,
    pub name: String,
    pub email: String,
    pub summary: ScoreSummary,
    pub raw: RawScore,
    pub result_token: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl From<QuizResult> for ResultView {
    fn from(result: QuizResult) -> Self {
        ResultView {
            quiz_id: result.quiz_id,
            name: result.name,
            email: result.email,
            summary: result.summary,
            raw: result.raw,
            result_token: result.result_token,
            completed_at: result.created_at,
        }
    }
}
