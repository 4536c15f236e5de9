// src/services/attempts.rs

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use crate::{
    models::{
        answer::CanonicalAnswer,
        attempt::{AnswerUpsert, Attempt, AttemptStatus, Registration, StoredAnswer},
        quiz::ScoringFramework,
        result::ScoreSummary,
    },
    services::scoring::{ScoringError, calculate_score},
    store::{AttemptStore, StoreError},
};

#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("User attempt not found for email {0}. Please register first.")]
    NotFound(String),

    #[error("An attempt for {email} is already {status}")]
    Locked { email: String, status: AttemptStatus },

    #[error("normalize-failed: answers missing questionId/selectedOption")]
    IncompleteAnswers,

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input to [`AttemptService::finalize_attempt`].
#[derive(Debug, Clone)]
pub struct FinalizeInput {
    /// As sent by the client. Logged, never used to locate the attempt.
    pub user_id: String,
    pub email: String,
    pub answers: Vec<CanonicalAnswer>,
}

/// A completed attempt and the score it was completed with.
#[derive(Debug, Clone)]
pub struct FinalizedAttempt {
    pub attempt: Attempt,
    pub summary: ScoreSummary,
}

/// Outcome of a single autosave.
#[derive(Debug, Clone)]
pub struct SavedAnswer {
    pub upsert: AnswerUpsert,
    pub status: AttemptStatus,
    pub answer_count: usize,
}

/// Attempt lifecycle for one quiz.
pub struct AttemptService {
    store: Arc<dyn AttemptStore>,
}

impl AttemptService {
    pub fn new(store: Arc<dyn AttemptStore>) -> Self {
        Self { store }
    }

    /// Registers a user, or refreshes the identity of an attempt still in progress.
    ///
    /// Attempts that moved past `in_progress` are never reset.
    pub async fn create_or_update_user(
        &self,
        registration: Registration,
    ) -> Result<Attempt, AttemptError> {
        if let Some(existing) = self.store.find_by_email(&registration.email, None).await? {
            return self.refresh_identity(existing, registration).await;
        }

        let attempt = Attempt::new(registration.clone());
        match self.store.insert(&attempt).await {
            Ok(()) => {
                tracing::info!("User registered: {} (quiz {})", attempt.email, attempt.quiz_id);
                Ok(attempt)
            }
            // Lost a race with a concurrent registration for the same email.
            Err(StoreError::DuplicateAttempt(email)) => {
                let existing = self
                    .store
                    .find_by_email(&email, None)
                    .await?
                    .ok_or(AttemptError::NotFound(email))?;
                self.refresh_identity(existing, registration).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn refresh_identity(
        &self,
        attempt: Attempt,
        registration: Registration,
    ) -> Result<Attempt, AttemptError> {
        if attempt.status.is_locked() {
            return Err(locked(attempt));
        }

        match self.store.update_identity(attempt.id, &registration).await? {
            Some(updated) => {
                tracing::info!("User updated: {} (quiz {})", updated.email, updated.quiz_id);
                Ok(updated)
            }
            // Finalized between the read and the write.
            None => {
                let current = self
                    .store
                    .find_by_email(&attempt.email, None)
                    .await?
                    .ok_or(AttemptError::NotFound(attempt.email))?;
                Err(locked(current))
            }
        }
    }

    /// Autosaves one answer. The user must have registered first.
    pub async fn save_answer(
        &self,
        email: &str,
        question_id: &str,
        option_key: Option<String>,
        option_value: Option<Value>,
    ) -> Result<SavedAnswer, AttemptError> {
        let attempt = match self
            .store
            .find_by_email(email, Some(AttemptStatus::InProgress))
            .await?
        {
            Some(attempt) => attempt,
            None => {
                let attempt = self
                    .store
                    .find_by_email(email, None)
                    .await?
                    .ok_or_else(|| AttemptError::NotFound(email.to_string()))?;
                tracing::warn!(
                    "Saving answer into {} attempt for {} (quiz {})",
                    attempt.status,
                    email,
                    attempt.quiz_id
                );
                attempt
            }
        };

        let answer = StoredAnswer {
            question_id: question_id.to_string(),
            option_key: option_key.unwrap_or_default(),
            option_value: option_value.unwrap_or_else(|| Value::String(String::new())),
            timestamp: Utc::now(),
        };
        let (upsert, attempt) = self
            .store
            .upsert_answer(attempt.id, answer)
            .await?
            .ok_or_else(|| AttemptError::NotFound(email.to_string()))?;

        tracing::debug!("Answer {:?} for question {} ({})", upsert, question_id, email);
        Ok(SavedAnswer {
            upsert,
            status: attempt.status,
            answer_count: attempt.answers.len(),
        })
    }

    /// Writes the final answer set, scores it and completes the attempt.
    ///
    /// Persists twice: once as `finalizing` before scoring, once as
    /// `completed` with the score. A completed attempt may be finalized again.
    pub async fn finalize_attempt(
        &self,
        input: FinalizeInput,
        framework: &ScoringFramework,
    ) -> Result<FinalizedAttempt, AttemptError> {
        if !input.answers.iter().all(CanonicalAnswer::is_complete) {
            return Err(AttemptError::IncompleteAnswers);
        }

        let mut attempt = self
            .store
            .find_by_email(&input.email, None)
            .await?
            .ok_or_else(|| AttemptError::NotFound(input.email.clone()))?;

        if attempt.user_id != input.user_id {
            tracing::debug!(
                "Client user id {} differs from stored {} for {}",
                input.user_id,
                attempt.user_id,
                input.email
            );
        }
        if attempt.status == AttemptStatus::Completed {
            tracing::info!("Re-finalizing completed attempt {}", attempt.id);
        }

        attempt.replace_answers(&input.answers);
        attempt.begin_finalizing();
        self.store.update_progress(&attempt).await?;

        let summary = calculate_score(&input.answers, framework)?;

        attempt.complete(summary.clone());
        self.store.update_progress(&attempt).await?;

        tracing::info!(
            "Attempt {} finalized with {} answers, top category {}",
            attempt.id,
            input.answers.len(),
            summary.top_category
        );
        Ok(FinalizedAttempt { attempt, summary })
    }
}

fn locked(attempt: Attempt) -> AttemptError {
    tracing::warn!(
        "Rejected re-registration of {} for quiz {}: attempt is {}",
        attempt.email,
        attempt.quiz_id,
        attempt.status
    );
    AttemptError::Locked {
        email: attempt.email,
        status: attempt.status,
    }
}
