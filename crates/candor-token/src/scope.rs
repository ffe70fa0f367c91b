// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::{Claims, TokenError};

/// Global capability carried by every AIPT.
pub const AI_ASK_SCOPE: &str = "ai:ask";

/// Session-bound scope granted by an IST.
pub fn ist_scope(session_id: &str) -> String {
    format!("interview:session:{session_id}")
}

/// Session-bound scope granted by a WST.
pub fn ws_scope(session_id: &str) -> String {
    format!("ws:interview:{session_id}")
}

/// Session-bound scope granted by an ACET.
pub fn acet_scope(session_id: &str) -> String {
    format!("anti-cheat:emit:{session_id}")
}

/// Session-bound scope granted by a UPT.
pub fn upload_scope(session_id: &str) -> String {
    format!("upload:session:{session_id}")
}

/// Pass iff `required` is present verbatim in the token's scope set.
///
/// Matching is strict string equality.  No prefix or wildcard expansion —
/// a scope that almost matches grants nothing.
pub fn require_scope(claims: &Claims, required: &str) -> Result<(), TokenError> {
    if claims.scope.iter().any(|s| s == required) {
        Ok(())
    } else {
        Err(TokenError::InsufficientScope)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
