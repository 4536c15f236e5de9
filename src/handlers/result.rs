// src/handlers/result.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::open_quiz,
    models::result::{ResultLookupQuery, ResultView},
    services::results::ResultService,
    state::AppState,
};

async fn service(state: &AppState, quiz_id: &str) -> Result<ResultService, AppError> {
    let quiz = open_quiz(&state.stores, quiz_id).await?;
    Ok(ResultService::new(quiz.stores.results, state.tokens.clone()))
}

/// Newest result for an email on a quiz. The email match ignores case.
pub async fn get_result(
    State(state): State<AppState>,
    Query(query): Query<ResultLookupQuery>,
) -> Result<impl IntoResponse, AppError> {
    query.validate()?;

    let result = service(&state, &query.quiz_id)
        .await?
        .find_by_email(&query.email)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("Results not found for this email and quiz type".to_string())
        })?;

    Ok(Json(json!({
        "success": true,
        "data": ResultView::from(result),
    })))
}

pub async fn get_result_by_token(
    State(state): State<AppState>,
    Path((quiz_id, token)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let result = service(&state, &quiz_id)
        .await?
        .find_by_token(&token)
        .await?
        .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": ResultView::from(result),
    })))
}
