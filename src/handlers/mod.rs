// src/handlers/mod.rs

pub mod attempt;
pub mod health;
pub mod quiz;
pub mod result;

use crate::{
    error::AppError,
    store::{OpenQuiz, StoreRegistry},
};

/// 404 unless the catalog knows the quiz.
pub(crate) async fn open_quiz(stores: &StoreRegistry, quiz_id: &str) -> Result<OpenQuiz, AppError> {
    stores
        .open(quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz not found: {}", quiz_id)))
}
