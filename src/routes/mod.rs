//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::store::AppState;

pub mod http;

/// Build the application router with:
/// - REST-ish API under `/api/v1/...`
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/activities/complete", post(http::http_complete_activity))
        .route("/api/v1/quiz/attempt", post(http::http_quiz_attempt))
        .route("/api/v1/games/session", post(http::http_game_session))
        .route("/api/v1/cards/grant", post(http::http_card_grant))
        .route("/api/v1/cards/purchase", post(http::http_card_purchase))
        .route("/api/v1/challenges/claim", post(http::http_challenge_claim))
        .route("/api/v1/challenges/progress", get(http::http_challenge_progress))
        .route("/api/v1/profile/progress", get(http::http_profile_progress))
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
