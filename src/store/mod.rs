// src/store/mod.rs

//! Persistence seams.
//!
//! Handlers never talk to a database directly. They ask the [`StoreRegistry`]
//! to open a quiz, and the registry asks its [`StoreBackend`]
//! (PostgreSQL in production, memory in development and tests).

pub mod memory;
pub mod postgres;

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    attempt::{AnswerUpsert, Attempt, AttemptStatus, Registration, StoredAnswer},
    quiz::Quiz,
    result::QuizResult,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("result token '{0}' is already taken")]
    DuplicateToken(String),

    #[error("a result already exists for attempt {0}")]
    DuplicateResult(Uuid),

    #[error("an attempt for '{0}' already exists")]
    DuplicateAttempt(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// How an email is compared during result lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailMatch {
    /// Byte-for-byte.
    Exact,
    /// Trimmed and lowercased on both sides.
    Normalized,
}

/// Attempts of a single quiz.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Most recently updated attempt for `email`, optionally restricted to one status.
    async fn find_by_email(
        &self,
        email: &str,
        status: Option<AttemptStatus>,
    ) -> Result<Option<Attempt>, StoreError>;

    /// Fails with [`StoreError::DuplicateAttempt`] when the email is already registered.
    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError>;

    /// Writes answers, status, score and timestamps. Identity columns are left alone.
    async fn update_progress(&self, attempt: &Attempt) -> Result<(), StoreError>;

    /// Upserts one answer in place, touching only the answer list and `updated_at`.
    /// `None` when the attempt no longer exists.
    async fn upsert_answer(
        &self,
        id: Uuid,
        answer: StoredAnswer,
    ) -> Result<Option<(AnswerUpsert, Attempt)>, StoreError>;

    /// Refreshes identity columns, but only while the attempt is `in_progress`.
    /// `None` when it is missing or has moved on.
    async fn update_identity(
        &self,
        id: Uuid,
        registration: &Registration,
    ) -> Result<Option<Attempt>, StoreError>;
}

/// Results of a single quiz. Results are never updated.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn find_by_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizResult>, StoreError>;

    /// Fails with [`StoreError::DuplicateToken`] or [`StoreError::DuplicateResult`]
    /// when a uniqueness constraint is hit.
    async fn insert(&self, result: &QuizResult) -> Result<(), StoreError>;

    /// Newest result for `email`.
    async fn latest_by_email(
        &self,
        email: &str,
        mode: EmailMatch,
    ) -> Result<Option<QuizResult>, StoreError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<QuizResult>, StoreError>;
}

/// Read side of quiz content, plus the write used by startup seeding.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError>;

    async fn list_quiz_ids(&self) -> Result<Vec<String>, StoreError>;

    async fn put_quiz(&self, quiz: &Quiz) -> Result<(), StoreError>;
}

/// Builds quiz-scoped stores.
pub trait StoreBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt_store(&self, quiz_id: &str) -> Arc<dyn AttemptStore>;

    fn result_store(&self, quiz_id: &str) -> Arc<dyn ResultStore>;

    fn catalog(&self) -> Arc<dyn QuizCatalog>;
}

/// The stores of one quiz.
#[derive(Clone)]
pub struct QuizStores {
    pub attempts: Arc<dyn AttemptStore>,
    pub results: Arc<dyn ResultStore>,
}

/// A quiz the catalog knows about, with its stores.
#[derive(Clone)]
pub struct OpenQuiz {
    pub quiz: Quiz,
    pub stores: QuizStores,
}

/// Per-quiz store factory, built once at startup and shared through `AppState`.
#[derive(Clone)]
pub struct StoreRegistry {
    backend: Arc<dyn StoreBackend>,
    cache: Arc<RwLock<HashMap<String, QuizStores>>>,
}

impl StoreRegistry {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn catalog(&self) -> Arc<dyn QuizCatalog> {
        self.backend.catalog()
    }

    /// Looks the quiz up in the catalog and hands out its stores.
    ///
    /// `None` for ids the catalog does not know. Those are never cached.
    pub async fn open(&self, quiz_id: &str) -> Result<Option<OpenQuiz>, StoreError> {
        let Some(quiz) = self.backend.catalog().get_quiz(quiz_id).await? else {
            tracing::debug!("Refusing stores for unknown quiz {}", quiz_id);
            return Ok(None);
        };
        Ok(Some(OpenQuiz {
            stores: self.stores_for(&quiz.quiz_id),
            quiz,
        }))
    }

    fn stores_for(&self, quiz_id: &str) -> QuizStores {
        if let Some(stores) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(quiz_id)
        {
            return stores.clone();
        }

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(quiz_id.to_string())
            .or_insert_with(|| {
                tracing::debug!("Creating stores for quiz {}", quiz_id);
                QuizStores {
                    attempts: self.backend.attempt_store(quiz_id),
                    results: self.backend.result_store(quiz_id),
                }
            })
            .clone()
    }
}
