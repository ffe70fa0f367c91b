// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Interview lifecycle, anti-cheat, and token-issuance handlers.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use candor_chain::IncomingEvent;
use candor_engine::AnswerSubmission;
use candor_sandbox::TestCase;
use candor_store::{SessionConfig, SessionState};

use crate::error::ApiError;
use crate::state::AppState;

// ── Session lifecycle ─────────────────────────────────────────────────────────

/// POST /interview/sessions (user token) → session + IST.
pub async fn create_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(config): Json<SessionConfig>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = state.auth_user(&headers)?;
    let session = state.engine.create_session(&user.sub, config).await?;
    let ist = state.mint_ist(&session);
    Ok(Json(serde_json::json!({
        "sessionId": session.id,
        "ist": ist,
        "nextStep": "precheck",
    })))
}

#[derive(Debug, Deserialize)]
pub struct PrecheckPayload {
    #[serde(default)]
    pub checks: serde_json::Value,
    #[serde(default)]
    pub events: Vec<IncomingEvent>,
}

/// POST /interview/{id}/precheck (ACET).
pub async fn precheck(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<PrecheckPayload>,
) -> Result<Json<candor_engine::PrecheckOutcome>, ApiError> {
    state.auth_acet(&headers, &session_id)?;
    let outcome = state
        .engine
        .precheck(&session_id, payload.checks, payload.events)
        .await?;
    Ok(Json(outcome))
}

/// POST /interview/{id}/start (session cookie) → WST + AIPT + UPT.
pub async fn start(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_session(&headers)?;
    let session = state.engine.start(&session_id).await?;
    Ok(Json(serde_json::json!({
        "wst": state.mint_wst(&session),
        "aipt": state.mint_aipt(&session),
        "upt": state.mint_upt(&session.id),
        "nextStep": "interview",
    })))
}

/// GET /interview/{id}/state (user token).
pub async fn state(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_user(&headers)?;
    let (session_state, asked_count) = state.engine.state(&session_id).await?;
    Ok(Json(serde_json::json!({
        "state": session_state,
        "askedCount": asked_count,
    })))
}

// ── Questions & answers ───────────────────────────────────────────────────────

/// POST /interview/{id}/next-question (AIPT).
pub async fn next_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_aipt(&headers, &session_id)?;
    let (question, total, outbound) = state.engine.next_question(&session_id).await?;
    state.broadcast(&session_id, &outbound);
    Ok(Json(serde_json::json!({
        "questionId": question.id,
        "questionNumber": question.number,
        "totalQuestions": total,
        "type": question.question_type,
        "text": question.text,
        "metadata": question.metadata,
    })))
}

/// POST /interview/{id}/answer (IST).
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(submission): Json<AnswerSubmission>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_ist(&headers, &session_id)?;
    let (feedback, outbound) = state.engine.submit_answer(&session_id, submission).await?;
    state.broadcast(&session_id, &outbound);
    Ok(Json(serde_json::json!({
        "status": "submitted",
        "immediateFeedback": feedback,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeEvalRequest {
    pub code: String,
    #[serde(default = "default_function_name")]
    pub function_name: String,
    #[serde(default)]
    pub tests: Vec<TestCase>,
}

fn default_function_name() -> String {
    "solution".into()
}

/// POST /interview/{id}/code-eval (IST).
pub async fn code_eval(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CodeEvalRequest>,
) -> Result<Json<candor_sandbox::EvalReport>, ApiError> {
    state.auth_ist(&headers, &session_id)?;
    let report = state
        .engine
        .code_eval(&req.code, &req.function_name, &req.tests)
        .await?;
    Ok(Json(report))
}

/// POST /interview/{id}/finalize (IST).
pub async fn finalize(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_ist(&headers, &session_id)?;
    let summary = state.engine.finalize(&session_id).await?;
    Ok(Json(serde_json::json!({
        "summaryId": summary.id,
        "status": "Completed",
    })))
}

// ── Reports ───────────────────────────────────────────────────────────────────

/// GET /interview/{id}/summary (user token).
pub async fn summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_user(&headers)?;
    let summary = state.engine.summary(&session_id).await?;
    Ok(Json(serde_json::json!({
        "sessionId": session_id,
        "rubric": summary.summary.rubric,
        "strengths": summary.summary.strengths,
        "gaps": summary.summary.gaps,
        "scoreBreakdown": summary.summary.score_breakdown,
    })))
}

/// GET /interview/{id}/review (user token).
pub async fn review(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_user(&headers)?;
    Ok(Json(state.engine.review(&session_id).await?))
}

// ── Anti-cheat ────────────────────────────────────────────────────────────────

/// POST /interview/{id}/anti-cheat (ACET) — batch ingest.
pub async fn anti_cheat_emit(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<PrecheckPayload>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_acet(&headers, &session_id)?;
    let (tail, outbound) = state
        .engine
        .ingest_events(&session_id, payload.events)
        .await?;
    state.broadcast(&session_id, &outbound);
    Ok(Json(serde_json::json!({
        "tailSeq": tail.seq,
        "tailHash": tail.hash,
    })))
}

/// GET /interview/{id}/anti-cheat/tail (user token).
pub async fn anti_cheat_tail(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_user(&headers)?;
    let tail = state.engine.chain_tail(&session_id).await?;
    Ok(Json(serde_json::json!({
        "seq": tail.seq,
        "hash": tail.hash,
    })))
}

// ── Token issuance ────────────────────────────────────────────────────────────

/// POST /interview/{id}/token/refresh (session cookie) → IST, plus a WST
/// while the session is Active.
pub async fn refresh_tokens(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_session(&headers)?;
    let session = state.engine.session(&session_id).await?;
    let ist = state.mint_ist(&session);
    let wst = (session.state == SessionState::Active).then(|| state.mint_wst(&session));
    Ok(Json(serde_json::json!({ "ist": ist, "wst": wst })))
}

/// POST /interview/{id}/token/acet (session cookie).  Anti-cheat emission
/// only makes sense while the session can still change state — which
/// includes PendingPrecheck, since the precheck itself authenticates with
/// an ACET.
pub async fn issue_acet(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_session(&headers)?;
    let session = state.engine.session(&session_id).await?;
    if session.state.is_terminal() {
        return Err(ApiError::new(
            axum::http::StatusCode::CONFLICT,
            "invalid_state",
        ));
    }
    Ok(Json(serde_json::json!({ "acet": state.mint_acet(&session) })))
}

/// POST /interview/{id}/token/aipt (session cookie).  Active sessions only.
pub async fn issue_aipt(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_session(&headers)?;
    let session = state.engine.session(&session_id).await?;
    if session.state != SessionState::Active {
        return Err(ApiError::new(
            axum::http::StatusCode::CONFLICT,
            "invalid_state",
        ));
    }
    Ok(Json(serde_json::json!({ "aipt": state.mint_aipt(&session) })))
}
