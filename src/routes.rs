// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, health, quiz, result},
    state::AppState,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Assembles the main application router.
///
/// * Quiz content and attempt lifecycle under `/api/quizzes`.
/// * Token-addressed results under `/api/results`.
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let quiz_routes = Router::new()
        .route("/list", get(quiz::list_quizzes))
        .route("/results", get(result::get_result))
        .route("/{quiz_id}", get(quiz::get_quiz))
        .route("/{quiz_id}/register", post(attempt::register))
        .route("/{quiz_id}/answer", post(attempt::save_answer))
        .route("/{quiz_id}/finalize", post(attempt::finalize));

    let result_routes = Router::new().route("/{quiz_id}/{token}", get(result::get_result_by_token));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/results", result_routes)
        // Applied top to bottom: trace sees every request, CORS included.
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
