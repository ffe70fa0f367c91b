// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use candor_engine::EngineError;
use candor_token::TokenError;

/// Wire error: HTTP status plus the error code in `{"detail": code}`.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
        }
    }

    pub fn unauthorized(code: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, code)
    }

    pub fn forbidden(code: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, code)
    }

    pub fn bad_request(code: &str) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code)
    }

    pub fn not_found(code: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, code)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.code }))).into_response()
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        let status = match e {
            TokenError::InsufficientScope => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        Self::new(status, e.code())
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match &e {
            EngineError::ConsentRequired
            | EngineError::Validation(_)
            | EngineError::NoQuestionsRemaining
            | EngineError::Chain(_)
            | EngineError::Sandbox(_) => StatusCode::BAD_REQUEST,
            EngineError::SessionNotFound | EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::InvalidState | EngineError::AnswerRequired => StatusCode::CONFLICT,
            EngineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.code())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use candor_chain::ChainError;

    #[test]
    fn engine_errors_map_to_documented_statuses() {
        let cases: &[(EngineError, StatusCode, &str)] = &[
            (EngineError::ConsentRequired, StatusCode::BAD_REQUEST, "consent_required"),
            (EngineError::NoQuestionsRemaining, StatusCode::BAD_REQUEST, "no_questions_remaining"),
            (
                EngineError::Chain(ChainError::Broken),
                StatusCode::BAD_REQUEST,
                "event_chain_broken",
            ),
            (EngineError::SessionNotFound, StatusCode::NOT_FOUND, "session_not_found"),
            (EngineError::InvalidState, StatusCode::CONFLICT, "invalid_state"),
            (EngineError::AnswerRequired, StatusCode::CONFLICT, "answer_required"),
            (EngineError::RateLimited, StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
            (
                EngineError::Store("down".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "database_not_connected",
            ),
        ];
        for (err, status, code) in cases {
            let api: ApiError = err.clone().into();
            assert_eq!(api.status, *status, "{err:?}");
            assert_eq!(api.code, *code, "{err:?}");
        }
    }

    #[test]
    fn token_errors_split_401_and_403() {
        let api: ApiError = TokenError::Expired.into();
        assert_eq!(api.status, StatusCode::UNAUTHORIZED);
        assert_eq!(api.code, "token_expired");

        let api: ApiError = TokenError::InsufficientScope.into();
        assert_eq!(api.status, StatusCode::FORBIDDEN);
        assert_eq!(api.code, "insufficient_scope");
    }
}
