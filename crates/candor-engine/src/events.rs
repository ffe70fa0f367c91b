// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;

use candor_store::{Feedback, Severity, Strike};

/// Real-time events the engine asks its caller to broadcast after commit.
/// Serialized as the WebSocket wire messages (tagged with `type`).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum Outbound {
    #[serde(rename = "QUESTION_CREATED")]
    QuestionCreated {
        question_id: String,
        qtype: String,
        number: u32,
    },
    #[serde(rename = "FEEDBACK_CREATED")]
    FeedbackCreated {
        question_id: String,
        feedback: Feedback,
    },
    #[serde(rename = "STRIKE_CREATED")]
    StrikeCreated {
        session_id: String,
        strike_type: String,
        severity: Severity,
        ts: String,
        details: serde_json::Value,
    },
    #[serde(rename = "SESSION_PAUSED")]
    SessionPaused { reason: String },
    #[serde(rename = "SESSION_ENDED")]
    SessionEnded { reason: String },
}

impl Outbound {
    pub fn strike(strike: &Strike) -> Self {
        Outbound::StrikeCreated {
            session_id: strike.session_id.clone(),
            strike_type: strike.strike_type.clone(),
            severity: strike.severity,
            ts: strike.ts.clone(),
            details: strike.details.clone(),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
