// src/services/results.rs

use std::sync::Arc;

use crate::{
    config::RESULT_TOKEN_MAX_ATTEMPTS,
    models::result::{NewResult, QuizResult},
    store::{EmailMatch, ResultStore, StoreError},
    utils::{identity::normalize_email, token::TokenSource},
};

#[derive(Debug, thiserror::Error)]
pub enum ResultError {
    #[error("Could not allocate a unique result token after {0} attempts")]
    TokensExhausted(usize),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Creates and looks up immutable results for one quiz.
pub struct ResultService {
    store: Arc<dyn ResultStore>,
    tokens: Arc<dyn TokenSource>,
    max_attempts: usize,
}

impl ResultService {
    pub fn new(store: Arc<dyn ResultStore>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            store,
            tokens,
            max_attempts: RESULT_TOKEN_MAX_ATTEMPTS,
        }
    }

    /// Persists a result with a fresh token.
    ///
    /// At most one result exists per attempt: if one is already stored, it is
    /// returned unchanged and no new token is drawn.
    pub async fn create_result(&self, new: NewResult) -> Result<QuizResult, ResultError> {
        if let Some(existing) = self.store.find_by_attempt(new.attempt_id).await? {
            tracing::info!(
                "Result already exists for attempt {}, returning {}",
                new.attempt_id,
                existing.id
            );
            return Ok(existing);
        }

        for attempt in 1..=self.max_attempts {
            let token = self.tokens.generate(&new.quiz_id);
            let result = QuizResult::from_new(new.clone(), token);

            match self.store.insert(&result).await {
                Ok(()) => {
                    tracing::info!(
                        "Result {} saved for attempt {} (quiz {})",
                        result.id,
                        result.attempt_id,
                        result.quiz_id
                    );
                    return Ok(result);
                }
                Err(StoreError::DuplicateToken(token)) => {
                    tracing::warn!(
                        "Result token collision on try {}/{}: {}",
                        attempt,
                        self.max_attempts,
                        token
                    );
                }
                // A concurrent finalize won the race for this attempt.
                Err(StoreError::DuplicateResult(attempt_id)) => {
                    return match self.store.find_by_attempt(attempt_id).await? {
                        Some(existing) => Ok(existing),
                        None => Err(StoreError::DuplicateResult(attempt_id).into()),
                    };
                }
                Err(e) => {
                    tracing::error!("Failed to save result for attempt {}: {}", new.attempt_id, e);
                    return Err(e.into());
                }
            }
        }

        tracing::error!(
            "Gave up on result for attempt {} after {} token collisions",
            new.attempt_id,
            self.max_attempts
        );
        Err(ResultError::TokensExhausted(self.max_attempts))
    }

    /// Newest result for an email. Tries the address as given first, then
    /// a trimmed, case-insensitive match.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<QuizResult>, ResultError> {
        if let Some(result) = self.store.latest_by_email(email, EmailMatch::Exact).await? {
            return Ok(Some(result));
        }
        if normalize_email(email).is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .latest_by_email(email, EmailMatch::Normalized)
            .await?)
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<QuizResult>, ResultError> {
        Ok(self.store.find_by_token(token).await?)
    }
}
