// src/models/attempt.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    models::{answer::CanonicalAnswer, result::ScoreSummary},
    utils::{de::string_or_number, identity::PHONE_PATTERN},
};

/// Lifecycle of an attempt.
///
/// `in_progress -> submitted -> finalizing -> completed`. `submitted` is kept
/// for compatibility with stored data; no current path writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Finalizing,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Finalizing => "finalizing",
            AttemptStatus::Completed => "completed",
        }
    }

    /// Statuses past which a fresh registration may no longer reset the attempt.
    pub fn is_locked(&self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(AttemptStatus::InProgress),
            "submitted" => Ok(AttemptStatus::Submitted),
            "finalizing" => Ok(AttemptStatus::Finalizing),
            "completed" => Ok(AttemptStatus::Completed),
            other => Err(format!("unknown attempt status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// One stored answer. `option_value` keeps whatever the client sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnswer {
    pub question_id: String,
    pub option_key: String,
    pub option_value: Value,
    pub timestamp: DateTime<Utc>,
}

impl From<&CanonicalAnswer> for StoredAnswer {
    fn from(answer: &CanonicalAnswer) -> Self {
        StoredAnswer {
            question_id: answer.question_id.clone(),
            option_key: answer.selected_option.clone(),
            option_value: Value::String(answer.selected_option.clone()),
            timestamp: Utc::now(),
        }
    }
}

/// Whether an upsert replaced an earlier answer or appended a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerUpsert {
    Replaced,
    Added,
}

/// Identity captured at registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub quiz_id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub gender: Option<Gender>,
}

/// A user's submission for one quiz, keyed by (quiz_id, email).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: Uuid,
    pub quiz_id: String,
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub gender: Option<Gender>,
    pub answers: Vec<StoredAnswer>,
    pub status: AttemptStatus,
    pub score: Option<ScoreSummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn new(registration: Registration) -> Self {
        let now = Utc::now();
        Attempt {
            id: Uuid::new_v4(),
            quiz_id: registration.quiz_id,
            user_id: registration.user_id,
            email: registration.email,
            name: registration.name,
            phone: registration.phone,
            gender: registration.gender,
            answers: Vec::new(),
            status: AttemptStatus::InProgress,
            score: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Refreshes the identity fields of an existing attempt.
    pub fn update_identity(&mut self, registration: Registration) {
        self.user_id = registration.user_id;
        self.name = registration.name;
        self.phone = registration.phone;
        self.gender = registration.gender;
        self.touch();
    }

    /// Answers are keyed by question id: a second answer replaces the first in place.
    pub fn upsert_answer(&mut self, answer: StoredAnswer) -> AnswerUpsert {
        self.touch();
        match self
            .answers
            .iter_mut()
            .find(|a| a.question_id == answer.question_id)
        {
            Some(existing) => {
                *existing = answer;
                AnswerUpsert::Replaced
            }
            None => {
                self.answers.push(answer);
                AnswerUpsert::Added
            }
        }
    }

    /// Replaces every answer with the finalized set.
    pub fn replace_answers(&mut self, answers: &[CanonicalAnswer]) {
        self.answers = answers.iter().map(StoredAnswer::from).collect();
        self.touch();
    }

    pub fn begin_finalizing(&mut self) {
        self.status = AttemptStatus::Finalizing;
        self.touch();
    }

    pub fn complete(&mut self, score: ScoreSummary) {
        let now = Utc::now();
        self.status = AttemptStatus::Completed;
        self.score = Some(score);
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// DTO for `POST /api/quizzes/{quiz_id}/register`.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(
        length(min = 10, max = 15, message = "Phone number must be 10 to 15 characters."),
        regex(path = *PHONE_PATTERN, message = "Phone number contains invalid characters")
    )]
    pub phone: String,
    pub gender: Option<Gender>,
}

/// DTO for `POST /api/quizzes/{quiz_id}/answer`.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswerRequest {
    #[validate(email(message = "Valid email is required"))]
    pub email: String,
    #[serde(deserialize_with = "string_or_number")]
    #[validate(length(min = 1, message = "Question id is required"))]
    pub question_id: String,
    pub option_key: Option<String>,
    pub option_value: Option<Value>,
}

impl SaveAnswerRequest {
    /// Field rules plus the cross-field rule that some choice must be present.
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        let has_key = self.option_key.as_deref().is_some_and(|k| !k.is_empty());
        let has_value = self
            .option_value
            .as_ref()
            .is_some_and(|v| !v.is_null() && v.as_str() != Some(""));
        if !has_key && !has_value {
            errors.add(
                "optionKey",
                ValidationError::new("choice_required")
                    .with_message("Either optionKey or optionValue must be provided".into()),
            );
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// DTO for `POST /api/quizzes/{quiz_id}/finalize`.
///
/// `answers` stays untyped: the normalizer decides what each item means.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub answers: Option<Value>,
}
