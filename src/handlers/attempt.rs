// src/handlers/attempt.rs

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use serde_json::{Value, json};
use validator::Validate;

use crate::{
    error::AppError,
    handlers::open_quiz,
    models::attempt::{FinalizeRequest, Registration, RegisterRequest, SaveAnswerRequest},
    services::{
        attempts::AttemptService,
        normalizer::normalize_answers,
        submission::{FinalizeCommand, SubmissionService},
    },
    state::AppState,
    store::StoreRegistry,
    utils::identity::{derive_user_id, normalize_email},
};

/// Registers a user for a quiz, or refreshes the details of an attempt
/// that has not been submitted yet.
///
/// Returns 409 when the attempt is already past `in_progress`.
pub async fn register(
    State(stores): State<StoreRegistry>,
    Path(quiz_id): Path<String>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.validate()?;

    let quiz = open_quiz(&stores, &quiz_id).await?;
    let email = normalize_email(&payload.email);
    let service = AttemptService::new(quiz.stores.attempts);
    let attempt = service
        .create_or_update_user(Registration {
            quiz_id,
            user_id: derive_user_id(&email),
            email,
            name: payload.name.trim().to_string(),
            phone: payload.phone.trim().to_string(),
            gender: payload.gender,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "User registered successfully",
        "userId": attempt.user_id,
        "email": attempt.email,
        "userName": attempt.name,
    })))
}

/// Autosaves a single answer. Never creates an attempt.
pub async fn save_answer(
    State(stores): State<StoreRegistry>,
    Path(quiz_id): Path<String>,
    payload: Result<Json<SaveAnswerRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    payload.check()?;

    let quiz = open_quiz(&stores, &quiz_id).await?;
    let service = AttemptService::new(quiz.stores.attempts);
    let saved = service
        .save_answer(
            &normalize_email(&payload.email),
            &payload.question_id,
            payload.option_key,
            payload.option_value,
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Answer saved",
        "status": saved.status,
        "answerCount": saved.answer_count,
    })))
}

/// Finalizes an attempt: normalize, score, store the result, notify.
///
/// The response is sent as soon as the result is stored; both emails go
/// out on background tasks.
pub async fn finalize(
    State(state): State<AppState>,
    Path(quiz_id): Path<String>,
    payload: Result<Json<FinalizeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some(user_id), Some(email), Some(name)) = (
        present(payload.user_id),
        present(payload.email),
        present(payload.name),
    ) else {
        return Err(AppError::BadRequest(
            "Missing required fields: userId, quizId, email, name".to_string(),
        ));
    };

    let Some(Value::Array(items)) = payload.answers else {
        return Err(AppError::BadRequest("answers must be an array".to_string()));
    };

    let answers = normalize_answers(&items).map_err(|issues| {
        tracing::warn!("Rejected finalize for {} on {}: {} bad answers", email, quiz_id, issues.len());
        AppError::normalization(issues)
    })?;

    let quiz = open_quiz(&state.stores, &quiz_id).await?;
    let outcome = SubmissionService::new(&state, quiz)
        .finalize(FinalizeCommand {
            user_id,
            email: normalize_email(&email),
            name,
            phone: present(payload.phone),
            answers,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "userId": outcome.attempt.user_id,
        "quizId": quiz_id,
        "status": outcome.attempt.status,
        "score": outcome.summary,
        "resultToken": outcome.result.result_token,
    })))
}
