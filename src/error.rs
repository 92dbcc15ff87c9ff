//! Engine error taxonomy and its HTTP mapping.
//!
//! Quota, exhaustion and conflict states are legitimate user-visible
//! outcomes with stable `code` strings; internal faults surface as a
//! generic 500 with no detail leaked.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("rewards already claimed")]
    AlreadyClaimed,

    #[error("challenge not completed yet")]
    ChallengeNotCompleted,

    #[error("insufficient diamonds: need {needed}, have {available}")]
    InsufficientDiamonds { needed: i64, available: i64 },

    #[error("daily card limit reached; you can earn up to {limit} cards per day")]
    DailyLimitReached { limit: u32 },

    #[error("no new cards available in this category; you already own them all")]
    CategoryExhausted,

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn status(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::AlreadyClaimed => StatusCode::CONFLICT,
            EngineError::ChallengeNotCompleted => StatusCode::BAD_REQUEST,
            EngineError::InsufficientDiamonds { .. } => StatusCode::BAD_REQUEST,
            EngineError::DailyLimitReached { .. } => StatusCode::TOO_MANY_REQUESTS,
            EngineError::CategoryExhausted => StatusCode::CONFLICT,
            EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "BAD_REQUEST",
            EngineError::NotFound(_) => "NOT_FOUND",
            EngineError::Conflict(_) => "CONFLICT",
            EngineError::AlreadyClaimed => "ALREADY_CLAIMED",
            EngineError::ChallengeNotCompleted => "NOT_COMPLETED",
            EngineError::InsufficientDiamonds { .. } => "INSUFFICIENT_DIAMONDS",
            EngineError::DailyLimitReached { .. } => "DAILY_LIMIT_REACHED",
            EngineError::CategoryExhausted => "CATEGORY_EXHAUSTED",
            EngineError::Internal(_) => "SERVER_ERROR",
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Never leak internals to the client.
        let message = if matches!(self, EngineError::Internal(_)) {
            tracing::error!(target: "pylearn_backend", error = %self, "internal engine error");
            "Server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "success": false, "error": message, "code": self.code() })))
            .into_response()
    }
}
