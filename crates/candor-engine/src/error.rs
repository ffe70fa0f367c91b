// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use thiserror::Error;

use candor_chain::ChainError;
use candor_sandbox::SandboxError;
use candor_store::StoreError;

/// Engine failures, each carrying its wire error code.  The gateway maps
/// these onto HTTP statuses; the engine itself is transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Both consent flags must be true at session creation.
    #[error("consent_required")]
    ConsentRequired,
    /// Request shape violated an invariant on the write path.
    #[error("{0}")]
    Validation(&'static str),
    #[error("session_not_found")]
    SessionNotFound,
    #[error("not_found")]
    NotFound,
    /// Operation not allowed in the session's current state.
    #[error("invalid_state")]
    InvalidState,
    /// A question is still outstanding.
    #[error("answer_required")]
    AnswerRequired,
    /// Question pacing window not yet elapsed.
    #[error("rate_limited")]
    RateLimited,
    #[error("no_questions_remaining")]
    NoQuestionsRemaining,
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    /// Store infrastructure failure; the session state is preserved.
    #[error("database_not_connected")]
    Store(String),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ConsentRequired => "consent_required",
            EngineError::Validation(code) => code,
            EngineError::SessionNotFound => "session_not_found",
            EngineError::NotFound => "not_found",
            EngineError::InvalidState => "invalid_state",
            EngineError::AnswerRequired => "answer_required",
            EngineError::RateLimited => "rate_limited",
            EngineError::NoQuestionsRemaining => "no_questions_remaining",
            EngineError::Chain(e) => e.code(),
            EngineError::Sandbox(_) => "disallowed_code",
            EngineError::Store(_) => "database_not_connected",
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::SessionNotFound => EngineError::SessionNotFound,
            StoreError::NotFound => EngineError::NotFound,
            // A CAS loss means the state moved underneath the request.
            StoreError::Conflict(_) => EngineError::InvalidState,
            // A raced event append reads as a stale-tail submission.
            StoreError::TailMoved => EngineError::Chain(ChainError::ReplayOrOutOfOrder),
            StoreError::AlreadyExists => EngineError::InvalidState,
            StoreError::Unavailable(msg) => EngineError::Store(msg),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_wire_taxonomy() {
        assert_eq!(EngineError::ConsentRequired.code(), "consent_required");
        assert_eq!(EngineError::InvalidState.code(), "invalid_state");
        assert_eq!(EngineError::RateLimited.code(), "rate_limited");
        assert_eq!(
            EngineError::Chain(ChainError::Broken).code(),
            "event_chain_broken"
        );
        assert_eq!(
            EngineError::Sandbox(SandboxError::DisallowedCode).code(),
            "disallowed_code"
        );
    }

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        assert_eq!(
            EngineError::from(StoreError::SessionNotFound),
            EngineError::SessionNotFound
        );
        assert_eq!(
            EngineError::from(StoreError::TailMoved).code(),
            "event_seq_replay_or_out_of_order"
        );
        assert_eq!(
            EngineError::from(StoreError::Conflict("state")),
            EngineError::InvalidState
        );
    }
}
