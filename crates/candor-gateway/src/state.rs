// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::warn;

use candor_ai::AiProxy;
use candor_config::Settings;
use candor_engine::{Engine, Outbound};
use candor_store::{MemoryStore, Session};
use candor_token::{
    acet_scope, ist_scope, upload_scope, ws_scope, Audience, MintSpec, TokenService, AI_ASK_SCOPE,
};

use crate::broadcast::BroadcastBus;

/// Shared state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub tokens: Arc<TokenService>,
    pub bus: Arc<BroadcastBus>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Assemble the full stack from settings: in-process store, configured
    /// AI proxy, engine, token service, broadcast bus.
    pub fn from_settings(settings: Settings) -> Self {
        let secret = resolve_signing_secret(&settings);
        let revocation_ttl = settings.tokens.user.max(settings.tokens.upt) as i64;
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::new(
            store,
            AiProxy::from_config(&settings.ai),
            settings.policy.clone(),
            &settings.sandbox,
        );
        Self {
            engine: Arc::new(engine),
            tokens: Arc::new(TokenService::with_revocation_ttl(&secret, revocation_ttl)),
            bus: Arc::new(BroadcastBus::new()),
            settings: Arc::new(settings),
        }
    }

    /// Broadcast engine events to the session's room, post-commit.
    pub fn broadcast(&self, session_id: &str, events: &[Outbound]) {
        let room = format!("session:{session_id}");
        for event in events {
            match serde_json::to_value(event) {
                Ok(message) => {
                    self.bus.emit(&room, &message);
                }
                Err(e) => warn!(%room, "unserializable outbound event: {e}"),
            }
        }
    }

    // ── Token minting (one helper per audience) ───────────────────────────────

    pub fn mint_user_token(&self, sub: &str, device_id: &str, ip: Option<&str>) -> String {
        let mut spec = MintSpec::new(sub, "candidate", Audience::UserApi, self.settings.tokens.user)
            .scope("user")
            .device(device_id);
        if let Some(ip) = ip {
            spec = spec.client_ip(ip);
        }
        self.tokens.mint(spec)
    }

    pub fn mint_session_token(&self, sub: &str, device_id: &str) -> String {
        self.tokens.mint(
            MintSpec::new(sub, "candidate", Audience::Session, self.settings.tokens.user)
                .scope("session")
                .device(device_id),
        )
    }

    pub fn mint_ist(&self, session: &Session) -> String {
        let remaining = session.config.question_count - session.asked_count.min(session.config.question_count);
        self.tokens.mint(
            MintSpec::new(
                &session.user_id,
                "candidate",
                Audience::InterviewApi,
                self.settings.tokens.ist,
            )
            .scope(ist_scope(&session.id))
            .session(&session.id)
            .extra("remainingQuestions", serde_json::json!(remaining)),
        )
    }

    pub fn mint_wst(&self, session: &Session) -> String {
        self.tokens.mint(
            MintSpec::new(
                &session.user_id,
                "candidate",
                Audience::InterviewWs,
                self.settings.tokens.wst,
            )
            .scope(ws_scope(&session.id))
            .session(&session.id),
        )
    }

    pub fn mint_aipt(&self, session: &Session) -> String {
        let remaining = session.config.question_count - session.asked_count.min(session.config.question_count);
        self.tokens.mint(
            MintSpec::new(
                &session.user_id,
                "candidate",
                Audience::AiProxy,
                self.settings.tokens.aipt,
            )
            .scope(AI_ASK_SCOPE)
            .session(&session.id)
            .extra("remainingQuestions", serde_json::json!(remaining))
            .extra("modes", serde_json::json!(session.config.modes))
            .extra(
                "difficulty",
                serde_json::json!(session.config.difficulty.as_str()),
            ),
        )
    }

    pub fn mint_upt(&self, session_id: &str) -> String {
        self.tokens.mint(
            MintSpec::new("media", "system", Audience::Upload, self.settings.tokens.upt)
                .scope(upload_scope(session_id))
                .session(session_id),
        )
    }

    pub fn mint_acet(&self, session: &Session) -> String {
        self.tokens.mint(
            MintSpec::new(
                &session.user_id,
                "candidate",
                Audience::AntiCheat,
                self.settings.tokens.acet,
            )
            .scope(acet_scope(&session.id))
            .session(&session.id),
        )
    }
}

/// Settings value, then the named environment variable, then a random
/// secret (tokens won't survive a restart — acceptable in development).
fn resolve_signing_secret(settings: &Settings) -> String {
    if !settings.auth.signing_secret.is_empty() {
        return settings.auth.signing_secret.clone();
    }
    if let Ok(secret) = std::env::var(&settings.auth.signing_secret_env) {
        if !secret.is_empty() {
            return secret;
        }
    }
    warn!("no signing secret configured; generating an ephemeral one");
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
