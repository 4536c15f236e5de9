// src/handlers/quiz.rs

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::{error::AppError, store::StoreRegistry};

/// Returns a quiz with its questions flattened across sections.
pub async fn get_quiz(
    State(stores): State<StoreRegistry>,
    Path(quiz_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = stores
        .catalog()
        .get_quiz(&quiz_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quiz not found: {}", quiz_id)))?;

    tracing::debug!("Serving quiz {} ({} questions)", quiz_id, quiz.question_count());
    Ok(Json(json!({
        "success": true,
        "data": quiz.view(),
    })))
}

pub async fn list_quizzes(
    State(stores): State<StoreRegistry>,
) -> Result<impl IntoResponse, AppError> {
    let ids = stores.catalog().list_quiz_ids().await?;
    Ok(Json(json!({
        "success": true,
        "data": ids,
    })))
}
