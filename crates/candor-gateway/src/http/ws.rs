// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Real-time session stream.
//!
//! `GET /interview/{id}/stream?token=WST` upgrades, joins the session's
//! broadcast room, and relays room messages as JSON text frames.  Client
//! frames are keep-alive only and are discarded.
//!
//! Authentication happens on the upgrade request, but the browser WebSocket
//! API cannot read HTTP error responses — so rejections complete the
//! upgrade and immediately close with an application code the client can
//! see: 4401 (missing token) or 4403 (invalid token/scope).

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use tracing::debug;

use candor_token::{require_scope, ws_scope, Audience, Claims};

use crate::state::AppState;

/// Close code when no token was presented.
pub const CLOSE_MISSING_TOKEN: u16 = 4401;
/// Close code when the token failed verification or scope.
pub const CLOSE_INVALID_TOKEN: u16 = 4403;

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /interview/{id}/stream?token=WST.
pub async fn stream(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<StreamQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    match validate_stream_token(&state, &session_id, query.token.as_deref()) {
        Ok(_claims) => ws.on_upgrade(move |socket| relay(socket, state, session_id)),
        Err(code) => ws.on_upgrade(move |socket| close_with(socket, code)),
    }
}

/// WST check for the stream route: audience `interview-ws`, scope
/// `ws:interview:<path id>`.  Returns the close code to send on failure.
pub fn validate_stream_token(
    state: &AppState,
    session_id: &str,
    token: Option<&str>,
) -> Result<Claims, u16> {
    let token = token.ok_or(CLOSE_MISSING_TOKEN)?;
    let claims = state
        .tokens
        .verify(token, Audience::InterviewWs)
        .map_err(|_| CLOSE_INVALID_TOKEN)?;
    require_scope(&claims, &ws_scope(session_id)).map_err(|_| CLOSE_INVALID_TOKEN)?;
    Ok(claims)
}

async fn close_with(mut socket: WebSocket, code: u16) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: "unauthorized".into(),
        })))
        .await;
}

async fn relay(mut socket: WebSocket, state: AppState, session_id: String) {
    let room = format!("session:{session_id}");
    let (subscriber_id, mut events) = state.bus.join(&room);
    debug!(%room, subscriber_id, "stream joined");

    loop {
        tokio::select! {
            // Room event → client.
            event = events.recv() => {
                match event {
                    Some(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Client frame → keep-alive only.
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%room, "stream recv error: {e}");
                        break;
                    }
                }
            }
        }
    }

    state.bus.leave(&room, subscriber_id);
    debug!(%room, subscriber_id, "stream left");
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
