// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Router assembly and the server entry point.

pub mod auth;
pub mod interview;
pub mod media;
pub mod security;
pub mod ws;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state);
    let body_limit = state.settings.server.max_request_mb * 1024 * 1024;

    Router::new()
        // ── Auth ──────────────────────────────────────────────────────────────
        .route("/auth/login", post(auth::login))
        // ── Interview lifecycle ───────────────────────────────────────────────
        .route("/interview/sessions", post(interview::create_session))
        .route("/interview/:id/precheck", post(interview::precheck))
        .route("/interview/:id/start", post(interview::start))
        .route("/interview/:id/next-question", post(interview::next_question))
        .route("/interview/:id/answer", post(interview::submit_answer))
        .route("/interview/:id/code-eval", post(interview::code_eval))
        .route("/interview/:id/finalize", post(interview::finalize))
        .route("/interview/:id/state", get(interview::state))
        .route("/interview/:id/summary", get(interview::summary))
        .route("/interview/:id/review", get(interview::review))
        // ── Anti-cheat ────────────────────────────────────────────────────────
        .route("/interview/:id/anti-cheat", post(interview::anti_cheat_emit))
        .route("/interview/:id/anti-cheat/tail", get(interview::anti_cheat_tail))
        // ── Token issuance ────────────────────────────────────────────────────
        .route("/interview/:id/token/refresh", post(interview::refresh_tokens))
        .route("/interview/:id/token/acet", post(interview::issue_acet))
        .route("/interview/:id/token/aipt", post(interview::issue_aipt))
        // ── Media ─────────────────────────────────────────────────────────────
        .route("/media/issue-upt", post(media::issue_upt))
        .route("/media/upload", post(media::upload))
        // ── Real-time stream ──────────────────────────────────────────────────
        .route("/interview/:id/stream", get(ws::stream))
        // ── Liveness ──────────────────────────────────────────────────────────
        .route("/healthz", get(healthz))
        .layer(middleware::from_fn(security::security_headers))
        .layer(cors)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind = state.settings.server.bind.clone();
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(%bind, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .settings
        .server
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring unparsable allowed origin");
                None
            }
        })
        .collect();
    // Credentialed CORS (session cookie) requires explicit origins/headers;
    // wildcard would make the browser drop the cookie.
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
