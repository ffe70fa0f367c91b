// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Credential extraction and per-audience verification.
//!
//! Guards are methods on [`AppState`]; each handler calls the one matching
//! its route's audience.  Session-bound audiences check the scope against
//! the **path** session id, so a token for session A presented on session
//! B's route fails with `insufficient_scope` even though it verifies.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use candor_token::{
    acet_scope, ist_scope, require_scope, upload_scope, Audience, Claims, AI_ASK_SCOPE,
};

use crate::error::ApiError;
use crate::state::AppState;

/// `Authorization: Bearer <token>` or `missing_bearer`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing_bearer"))
}

/// The `session` cookie or `missing_session`.
pub fn session_cookie(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|pair| {
                pair.trim()
                    .strip_prefix("session=")
                    .map(|token| token.to_string())
            })
        })
        .ok_or_else(|| ApiError::unauthorized("missing_session"))
}

impl AppState {
    /// Verify a token for a route's audience.  A genuinely signed token
    /// presented at a route of a *different* audience is an authorization
    /// failure (403 `insufficient_scope`), not an authentication one —
    /// forged, expired, and revoked tokens stay 401.
    fn verify_for(&self, token: &str, expected: Audience) -> Result<Claims, ApiError> {
        let claims = self.tokens.verify_any(token)?;
        if claims.aud != expected.as_str() {
            warn!(jti = %claims.jti, aud = %claims.aud, expected = expected.as_str(), "audience mismatch");
            return Err(ApiError::forbidden("insufficient_scope"));
        }
        Ok(claims)
    }

    /// User-audience bearer token.
    pub fn auth_user(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        let claims = self.verify_for(bearer_token(headers)?, Audience::UserApi)?;
        require_scope(&claims, "user").map_err(|e| self.log_scope_denial(&claims, "user", e))?;
        Ok(claims)
    }

    /// Session cookie (audience `session`).
    pub fn auth_session(&self, headers: &HeaderMap) -> Result<Claims, ApiError> {
        let token = session_cookie(headers)?;
        let claims = self.verify_for(&token, Audience::Session)?;
        require_scope(&claims, "session")
            .map_err(|e| self.log_scope_denial(&claims, "session", e))?;
        Ok(claims)
    }

    /// IST bound to the path session.
    pub fn auth_ist(&self, headers: &HeaderMap, session_id: &str) -> Result<Claims, ApiError> {
        let claims = self.verify_for(bearer_token(headers)?, Audience::InterviewApi)?;
        let required = ist_scope(session_id);
        require_scope(&claims, &required)
            .map_err(|e| self.log_scope_denial(&claims, &required, e))?;
        Ok(claims)
    }

    /// AIPT: global `ai:ask` scope, but the sessionId claim must match the
    /// path — an AIPT for another session is a scope failure.
    pub fn auth_aipt(&self, headers: &HeaderMap, session_id: &str) -> Result<Claims, ApiError> {
        let claims = self.verify_for(bearer_token(headers)?, Audience::AiProxy)?;
        require_scope(&claims, AI_ASK_SCOPE)
            .map_err(|e| self.log_scope_denial(&claims, AI_ASK_SCOPE, e))?;
        if claims.session_id.as_deref() != Some(session_id) {
            warn!(jti = %claims.jti, session_id, "AIPT session mismatch");
            return Err(ApiError::forbidden("insufficient_scope"));
        }
        Ok(claims)
    }

    /// ACET bound to the path session.
    pub fn auth_acet(&self, headers: &HeaderMap, session_id: &str) -> Result<Claims, ApiError> {
        let claims = self.verify_for(bearer_token(headers)?, Audience::AntiCheat)?;
        let required = acet_scope(session_id);
        require_scope(&claims, &required)
            .map_err(|e| self.log_scope_denial(&claims, &required, e))?;
        Ok(claims)
    }

    /// UPT presented as a query parameter on the upload route.  Returns the
    /// session id the token is bound to.
    pub fn auth_upt(&self, token: &str) -> Result<(Claims, String), ApiError> {
        let claims = self.verify_for(token, Audience::Upload)?;
        let session_id = claims
            .session_id
            .clone()
            .ok_or_else(|| ApiError::forbidden("insufficient_scope"))?;
        let required = upload_scope(&session_id);
        require_scope(&claims, &required)
            .map_err(|e| self.log_scope_denial(&claims, &required, e))?;
        Ok((claims, session_id))
    }

    fn log_scope_denial(
        &self,
        claims: &Claims,
        required: &str,
        e: candor_token::TokenError,
    ) -> ApiError {
        warn!(jti = %claims.jti, required, "scope denied");
        e.into()
    }
}

// ── Login ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// POST /auth/login — mints the user token and sets the session cookie.
///
/// No credential validation happens here: identity providers are outside
/// this service, and the subject is simply the lower-cased email.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<serde_json::Value>), ApiError> {
    let sub = req.email.to_lowercase();
    let device_id = Uuid::new_v4().to_string();
    let client_ip = forwarded_ip(&headers);

    let token = state.mint_user_token(&sub, &device_id, client_ip.as_deref());
    let session_token = state.mint_session_token(&sub, &device_id);

    let mut response_headers = HeaderMap::new();
    let cookie = session_cookie_value(&state, &session_token);
    response_headers.insert(
        axum::http::header::SET_COOKIE,
        cookie.parse().map_err(|_| {
            ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, "cookie_encoding")
        })?,
    );

    Ok((
        response_headers,
        Json(serde_json::json!({ "token": token, "deviceId": device_id })),
    ))
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn session_cookie_value(state: &AppState, token: &str) -> String {
    let mut cookie = format!(
        "session={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        state.settings.tokens.user
    );
    if state.settings.auth.cookie_secure {
        cookie.push_str("; Secure");
    }
    if let Some(domain) = &state.settings.auth.cookie_domain {
        cookie.push_str("; Domain=");
        cookie.push_str(domain);
    }
    cookie
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
