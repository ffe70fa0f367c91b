// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Stateless, audience-bound bearer tokens.
//!
//! # Wire format
//!
//! A token is two url-safe base64 segments joined by a dot:
//! ```text
//! b64url(canonical-JSON claims) "." b64url(HMAC-SHA-256(secret, first segment))
//! ```
//! Canonical JSON means recursively sorted keys with compact separators, so
//! a token minted here verifies anywhere the same secret and recipe are used.
//!
//! # Verification
//!
//! [`TokenService::verify`] checks, in order: signature (constant-time),
//! claim shape (`exp`, `iat`, `jti` required), audience, expiry, and the
//! in-process revocation set.  Failures map onto the wire error codes
//! `invalid_token`, `token_expired`, and `token_revoked`.
//!
//! Tokens are never persisted; revocation is by `jti` with a TTL at least as
//! long as the longest token lifetime.

mod claims;
mod revocation;
mod scope;
mod service;

pub use claims::{Audience, Claims};
pub use revocation::RevocationSet;
pub use scope::{acet_scope, ist_scope, require_scope, upload_scope, ws_scope, AI_ASK_SCOPE};
pub use service::{MintSpec, TokenService};

use thiserror::Error;

/// Authentication / authorization failures, named by their wire error code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token_expired")]
    Expired,
    #[error("invalid_token")]
    Invalid,
    #[error("token_revoked")]
    Revoked,
    #[error("insufficient_scope")]
    InsufficientScope,
}

impl TokenError {
    /// Wire error code surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            TokenError::Expired => "token_expired",
            TokenError::Invalid => "invalid_token",
            TokenError::Revoked => "token_revoked",
            TokenError::InsufficientScope => "insufficient_scope",
        }
    }
}
