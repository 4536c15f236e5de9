// src/error.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use std::fmt;
use validator::ValidationErrors;

use crate::{
    models::answer::NormalizationIssue,
    services::{
        attempts::AttemptError, results::ResultError, scoring::ScoringError,
        submission::SubmissionError,
    },
    store::StoreError,
};

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request, with per-field messages
    Validation { message: String, details: Value },

    // 422 Unprocessable Entity (answers that could not be normalized)
    Unprocessable { message: String, details: Value },

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., attempt already completed)
    Conflict(String),
}

impl AppError {
    pub fn normalization(issues: Vec<NormalizationIssue>) -> Self {
        AppError::Unprocessable {
            message: "normalize-failed: invalid answers".to_string(),
            details: serde_json::to_value(issues).unwrap_or(Value::Null),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response `{"error": ..., "details"?: ...}`.
/// Internal messages are logged and replaced with a generic one.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, message, Some(details))
            }
            AppError::Unprocessable { message, details } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, Some(details))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
        };

        let body = match details {
            Some(details) => json!({ "error": error_message, "details": details }),
            None => json!({ "error": error_message }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Bodies that are not JSON, or miss a field, are the client's fault.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Field name -> list of messages.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Map::new();
        for (field, errs) in errors.field_errors() {
            let messages: Vec<Value> = errs
                .iter()
                .map(|e| {
                    let text = match &e.message {
                        Some(message) => message.to_string(),
                        None => e.code.to_string(),
                    };
                    Value::String(text)
                })
                .collect();
            details.insert(field.to_string(), Value::Array(messages));
        }
        AppError::Validation {
            message: "Validation failed".to_string(),
            details: Value::Object(details),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateAttempt(email) => {
                AppError::Conflict(format!("An attempt for {} already exists", email))
            }
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<ScoringError> for AppError {
    fn from(err: ScoringError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<AttemptError> for AppError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::NotFound(_) => AppError::NotFound(err.to_string()),
            AttemptError::Locked { .. } => AppError::Conflict(err.to_string()),
            AttemptError::IncompleteAnswers => AppError::Unprocessable {
                message: err.to_string(),
                details: Value::Array(Vec::new()),
            },
            AttemptError::Scoring(e) => e.into(),
            AttemptError::Store(e) => e.into(),
        }
    }
}

impl From<ResultError> for AppError {
    fn from(err: ResultError) -> Self {
        match err {
            ResultError::Store(e) => e.into(),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<SubmissionError> for AppError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Attempt(e) => e.into(),
            SubmissionError::Result(e) => e.into(),
        }
    }
}
