// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// The seven token audiences used by the interview engine.
///
/// Every minted token is bound to exactly one audience; verification against
/// a different audience fails with `invalid_token`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Candidate-scoped REST (user token).
    UserApi,
    /// Session cookie.
    Session,
    /// IST — session-bound interview API token.
    InterviewApi,
    /// WST — WebSocket stream token.
    InterviewWs,
    /// AIPT — question generation only.
    AiProxy,
    /// UPT — media ingest.
    Upload,
    /// ACET — anti-cheat event emission.
    AntiCheat,
}

impl Audience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::UserApi => "user-api",
            Audience::Session => "session",
            Audience::InterviewApi => "interview-api",
            Audience::InterviewWs => "interview-ws",
            Audience::AiProxy => "ai-proxy",
            Audience::Upload => "upload",
            Audience::AntiCheat => "anti-cheat",
        }
    }
}

impl std::fmt::Display for Audience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed token payload.
///
/// Field names are the wire names; `extras` carries audience-specific
/// additions (e.g. `remainingQuestions`, `modes`, `difficulty` on an AIPT)
/// without the core caring what they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub scope: Vec<String>,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "deviceId", skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// 16-hex-char SHA-256 prefix of the client IP, when IP-bound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(flatten)]
    pub extras: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    /// Seconds of validity remaining at `now` (negative when expired).
    pub fn remaining_secs(&self, now: i64) -> i64 {
        self.exp - now
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
