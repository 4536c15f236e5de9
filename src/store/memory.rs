// src/store/memory.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerUpsert, Attempt, AttemptStatus, Registration, StoredAnswer},
        quiz::Quiz,
        result::QuizResult,
    },
    store::{
        AttemptStore, EmailMatch, QuizCatalog, ResultStore, StoreBackend, StoreError,
    },
    utils::identity::normalize_email,
};

/// Process-local backend. Enforces the same uniqueness rules as the
/// PostgreSQL schema so services behave identically on both.
#[derive(Default)]
pub struct MemoryBackend {
    attempts: Mutex<HashMap<String, Arc<MemoryAttemptStore>>>,
    results: Mutex<HashMap<String, Arc<MemoryResultStore>>>,
    catalog: Arc<MemoryCatalog>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn attempt_store(&self, quiz_id: &str) -> Arc<dyn AttemptStore> {
        self.attempts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(quiz_id.to_string())
            .or_default()
            .clone()
    }

    fn result_store(&self, quiz_id: &str) -> Arc<dyn ResultStore> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(quiz_id.to_string())
            .or_default()
            .clone()
    }

    fn catalog(&self) -> Arc<dyn QuizCatalog> {
        self.catalog.clone()
    }
}

#[derive(Default)]
pub struct MemoryAttemptStore {
    rows: RwLock<Vec<Attempt>>,
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn find_by_email(
        &self,
        email: &str,
        status: Option<AttemptStatus>,
    ) -> Result<Option<Attempt>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|a| a.email == email)
            .filter(|a| status.is_none_or(|s| a.status == s))
            .max_by_key(|a| a.updated_at)
            .cloned())
    }

    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|a| a.email == attempt.email) {
            return Err(StoreError::DuplicateAttempt(attempt.email.clone()));
        }
        rows.push(attempt.clone());
        Ok(())
    }

    async fn update_progress(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let slot = rows
            .iter_mut()
            .find(|a| a.id == attempt.id)
            .ok_or_else(|| StoreError::Corrupt(format!("attempt {} vanished", attempt.id)))?;
        slot.answers = attempt.answers.clone();
        slot.status = attempt.status;
        slot.score = attempt.score.clone();
        slot.updated_at = attempt.updated_at;
        slot.completed_at = attempt.completed_at;
        Ok(())
    }

    async fn upsert_answer(
        &self,
        id: Uuid,
        answer: StoredAnswer,
    ) -> Result<Option<(AnswerUpsert, Attempt)>, StoreError> {
        let mut rows = self.rows.write().await;
        Ok(rows.iter_mut().find(|a| a.id == id).map(|row| {
            let upsert = row.upsert_answer(answer);
            (upsert, row.clone())
        }))
    }

    async fn update_identity(
        &self,
        id: Uuid,
        registration: &Registration,
    ) -> Result<Option<Attempt>, StoreError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .iter_mut()
            .find(|a| a.id == id && a.status == AttemptStatus::InProgress)
            .map(|row| {
                row.update_identity(registration.clone());
                row.clone()
            }))
    }
}

#[derive(Default)]
pub struct MemoryResultStore {
    rows: RwLock<Vec<QuizResult>>,
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn find_by_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizResult>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|r| r.attempt_id == attempt_id).cloned())
    }

    async fn insert(&self, result: &QuizResult) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.iter().any(|r| r.attempt_id == result.attempt_id) {
            return Err(StoreError::DuplicateResult(result.attempt_id));
        }
        // Rows without a token never collide, matching the partial index.
        if let Some(token) = &result.result_token {
            if rows.iter().any(|r| r.result_token.as_ref() == Some(token)) {
                return Err(StoreError::DuplicateToken(token.clone()));
            }
        }
        rows.push(result.clone());
        Ok(())
    }

    async fn latest_by_email(
        &self,
        email: &str,
        mode: EmailMatch,
    ) -> Result<Option<QuizResult>, StoreError> {
        let rows = self.rows.read().await;
        let wanted = match mode {
            EmailMatch::Exact => email.to_string(),
            EmailMatch::Normalized => normalize_email(email),
        };
        Ok(rows
            .iter()
            .filter(|r| match mode {
                EmailMatch::Exact => r.email == wanted,
                EmailMatch::Normalized => normalize_email(&r.email) == wanted,
            })
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<QuizResult>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .find(|r| r.result_token.as_deref() == Some(token))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    quizzes: RwLock<Vec<Quiz>>,
}

#[async_trait]
impl QuizCatalog for MemoryCatalog {
    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.iter().find(|q| q.quiz_id == quiz_id).cloned())
    }

    async fn list_quiz_ids(&self) -> Result<Vec<String>, StoreError> {
        let quizzes = self.quizzes.read().await;
        Ok(quizzes.iter().map(|q| q.quiz_id.clone()).collect())
    }

    async fn put_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        let mut quizzes = self.quizzes.write().await;
        match quizzes.iter_mut().find(|q| q.quiz_id == quiz.quiz_id) {
            Some(existing) => *existing = quiz.clone(),
            None => quizzes.push(quiz.clone()),
        }
        Ok(())
    }
}
