// src/store/postgres.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, types::Json};
use uuid::Uuid;

use crate::{
    models::{
        attempt::{AnswerUpsert, Attempt, AttemptStatus, Gender, Registration, StoredAnswer},
        quiz::{Quiz, ScoringFramework, Section},
        result::{QuizResult, RawScore, ScoreSummary},
    },
    store::{
        AttemptStore, EmailMatch, QuizCatalog, ResultStore, StoreBackend, StoreError,
    },
    utils::identity::normalize_email,
};

// Index names from migrations/, reported back by Postgres on unique violations.
const ATTEMPT_IDENTITY_INDEX: &str = "attempts_quiz_email_key";
const RESULT_TOKEN_INDEX: &str = "results_quiz_token_key";
const RESULT_ATTEMPT_INDEX: &str = "results_attempt_id_key";

/// Backend on a shared PostgreSQL pool. Every quiz shares the same tables
/// and is scoped by its `quiz_id` column.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl StoreBackend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn attempt_store(&self, quiz_id: &str) -> Arc<dyn AttemptStore> {
        Arc::new(PgAttemptStore {
            pool: self.pool.clone(),
            quiz_id: quiz_id.to_string(),
        })
    }

    fn result_store(&self, quiz_id: &str) -> Arc<dyn ResultStore> {
        Arc::new(PgResultStore {
            pool: self.pool.clone(),
            quiz_id: quiz_id.to_string(),
        })
    }

    fn catalog(&self) -> Arc<dyn QuizCatalog> {
        Arc::new(PgCatalog {
            pool: self.pool.clone(),
        })
    }
}

/// Name of the unique index a failed write tripped over, if that is why it failed.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Some(db.constraint().unwrap_or_default().to_string())
        }
        _ => None,
    }
}

const ATTEMPT_COLUMNS: &str = "id, quiz_id, user_id, email, name, phone, gender, answers, \
                               status, score, created_at, updated_at, completed_at";

/// Row shape of the `attempts` table.
#[derive(FromRow)]
struct AttemptRow {
    id: Uuid,
    quiz_id: String,
    user_id: String,
    email: String,
    name: String,
    phone: String,
    gender: Option<String>,
    answers: Json<Vec<StoredAnswer>>,
    status: String,
    score: Option<Json<ScoreSummary>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttemptRow> for Attempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<AttemptStatus>().map_err(StoreError::Corrupt)?;
        let gender = match row.gender.as_deref() {
            None => None,
            Some("male") => Some(Gender::Male),
            Some("female") => Some(Gender::Female),
            Some(other) => {
                return Err(StoreError::Corrupt(format!("unknown gender '{}'", other)));
            }
        };

        Ok(Attempt {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            gender,
            answers: row.answers.0,
            status,
            score: row.score.map(|s| s.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}

fn gender_str(gender: Option<Gender>) -> Option<&'static str> {
    gender.map(|g| match g {
        Gender::Male => "male",
        Gender::Female => "female",
    })
}

pub struct PgAttemptStore {
    pool: PgPool,
    quiz_id: String,
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn find_by_email(
        &self,
        email: &str,
        status: Option<AttemptStatus>,
    ) -> Result<Option<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {} FROM attempts \
             WHERE quiz_id = $1 AND email = $2 AND ($3::TEXT IS NULL OR status = $3) \
             ORDER BY updated_at DESC LIMIT 1",
            ATTEMPT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(&self.quiz_id)
            .bind(email)
            .bind(status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?;

        row.map(Attempt::try_from).transpose()
    }

    async fn insert(&self, attempt: &Attempt) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attempts
            (id, quiz_id, user_id, email, name, phone, gender, answers,
             status, score, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(attempt.id)
        .bind(&self.quiz_id)
        .bind(&attempt.user_id)
        .bind(&attempt.email)
        .bind(&attempt.name)
        .bind(&attempt.phone)
        .bind(gender_str(attempt.gender))
        .bind(Json(&attempt.answers))
        .bind(attempt.status.as_str())
        .bind(attempt.score.as_ref().map(Json))
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .bind(attempt.completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(index) if index == ATTEMPT_IDENTITY_INDEX => {
                StoreError::DuplicateAttempt(attempt.email.clone())
            }
            _ => StoreError::from(e),
        })?;

        Ok(())
    }

    async fn update_progress(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE attempts SET
                answers = $2, status = $3, score = $4, updated_at = $5, completed_at = $6
            WHERE id = $1 AND quiz_id = $7
            "#,
        )
        .bind(attempt.id)
        .bind(Json(&attempt.answers))
        .bind(attempt.status.as_str())
        .bind(attempt.score.as_ref().map(Json))
        .bind(attempt.updated_at)
        .bind(attempt.completed_at)
        .bind(&self.quiz_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("attempt {} vanished", attempt.id)));
        }
        Ok(())
    }

    async fn upsert_answer(
        &self,
        id: Uuid,
        answer: StoredAnswer,
    ) -> Result<Option<(AnswerUpsert, Attempt)>, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent autosaves against finalize.
        let sql = format!(
            "SELECT {} FROM attempts WHERE id = $1 AND quiz_id = $2 FOR UPDATE",
            ATTEMPT_COLUMNS
        );
        let Some(row) = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(id)
            .bind(&self.quiz_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut attempt = Attempt::try_from(row)?;
        let upsert = attempt.upsert_answer(answer);

        sqlx::query("UPDATE attempts SET answers = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(&attempt.answers))
            .bind(attempt.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((upsert, attempt)))
    }

    async fn update_identity(
        &self,
        id: Uuid,
        registration: &Registration,
    ) -> Result<Option<Attempt>, StoreError> {
        let sql = format!(
            "UPDATE attempts SET user_id = $3, name = $4, phone = $5, gender = $6, updated_at = $7 \
             WHERE id = $1 AND quiz_id = $2 AND status = 'in_progress' \
             RETURNING {}",
            ATTEMPT_COLUMNS
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(id)
            .bind(&self.quiz_id)
            .bind(&registration.user_id)
            .bind(&registration.name)
            .bind(&registration.phone)
            .bind(gender_str(registration.gender))
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Attempt::try_from).transpose()
    }
}

/// Row shape of the `results` table.
#[derive(FromRow)]
struct ResultRow {
    id: Uuid,
    quiz_id: String,
    user_id: String,
    email: String,
    name: String,
    phone: String,
    summary: Json<ScoreSummary>,
    raw: Json<RawScore>,
    attempt_id: Uuid,
    result_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ResultRow> for QuizResult {
    fn from(row: ResultRow) -> Self {
        QuizResult {
            id: row.id,
            quiz_id: row.quiz_id,
            user_id: row.user_id,
            email: row.email,
            name: row.name,
            phone: row.phone,
            summary: row.summary.0,
            raw: row.raw.0,
            attempt_id: row.attempt_id,
            result_token: row.result_token,
            created_at: row.created_at,
        }
    }
}

const RESULT_COLUMNS: &str = "id, quiz_id, user_id, email, name, phone, summary, raw, \
                              attempt_id, result_token, created_at";

pub struct PgResultStore {
    pool: PgPool,
    quiz_id: String,
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn find_by_attempt(&self, attempt_id: Uuid) -> Result<Option<QuizResult>, StoreError> {
        let sql = format!(
            "SELECT {} FROM results WHERE quiz_id = $1 AND attempt_id = $2",
            RESULT_COLUMNS
        );
        let row = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(&self.quiz_id)
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(QuizResult::from))
    }

    async fn insert(&self, result: &QuizResult) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO results
            (id, quiz_id, user_id, email, name, phone, summary, raw,
             attempt_id, result_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(result.id)
        .bind(&self.quiz_id)
        .bind(&result.user_id)
        .bind(&result.email)
        .bind(&result.name)
        .bind(&result.phone)
        .bind(Json(&result.summary))
        .bind(Json(&result.raw))
        .bind(result.attempt_id)
        .bind(&result.result_token)
        .bind(result.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match unique_violation(&e).as_deref() {
            Some(RESULT_TOKEN_INDEX) => {
                StoreError::DuplicateToken(result.result_token.clone().unwrap_or_default())
            }
            Some(RESULT_ATTEMPT_INDEX) => StoreError::DuplicateResult(result.attempt_id),
            _ => StoreError::from(e),
        })?;

        Ok(())
    }

    async fn latest_by_email(
        &self,
        email: &str,
        mode: EmailMatch,
    ) -> Result<Option<QuizResult>, StoreError> {
        let (filter, needle) = match mode {
            EmailMatch::Exact => ("email = $2", email.to_string()),
            EmailMatch::Normalized => ("lower(btrim(email)) = $2", normalize_email(email)),
        };
        let sql = format!(
            "SELECT {} FROM results WHERE quiz_id = $1 AND {} ORDER BY created_at DESC LIMIT 1",
            RESULT_COLUMNS, filter
        );
        let row = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(&self.quiz_id)
            .bind(needle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(QuizResult::from))
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<QuizResult>, StoreError> {
        let sql = format!(
            "SELECT {} FROM results WHERE quiz_id = $1 AND result_token = $2",
            RESULT_COLUMNS
        );
        let row = sqlx::query_as::<_, ResultRow>(&sql)
            .bind(&self.quiz_id)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(QuizResult::from))
    }
}

#[derive(FromRow)]
struct QuizRow {
    quiz_id: String,
    title: Option<String>,
    description: Option<String>,
    sections: Json<Vec<Section>>,
    scoring_framework: Json<ScoringFramework>,
}

pub struct PgCatalog {
    pool: PgPool,
}

#[async_trait]
impl QuizCatalog for PgCatalog {
    async fn get_quiz(&self, quiz_id: &str) -> Result<Option<Quiz>, StoreError> {
        let row = sqlx::query_as::<_, QuizRow>(
            r#"
            SELECT quiz_id, title, description, sections, scoring_framework
            FROM quizzes
            WHERE quiz_id = $1
            "#,
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Quiz {
            quiz_id: r.quiz_id,
            title: r.title,
            description: r.description,
            sections: r.sections.0,
            scoring_framework: r.scoring_framework.0,
        }))
    }

    async fn list_quiz_ids(&self) -> Result<Vec<String>, StoreError> {
        let ids = sqlx::query_scalar::<_, String>("SELECT quiz_id FROM quizzes ORDER BY quiz_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn put_quiz(&self, quiz: &Quiz) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quizzes (quiz_id, title, description, sections, scoring_framework)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (quiz_id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                sections = EXCLUDED.sections,
                scoring_framework = EXCLUDED.scoring_framework,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&quiz.quiz_id)
        .bind(&quiz.title)
        .bind(&quiz.description)
        .bind(Json(&quiz.sections))
        .bind(Json(&quiz.scoring_framework))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
