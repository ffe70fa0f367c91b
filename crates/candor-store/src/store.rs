// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::records::{
    Answer, ChainTail, ChainedEvent, Feedback, Question, Session, SessionState, Strike, Summary,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("session_not_found")]
    SessionNotFound,
    #[error("not_found")]
    NotFound,
    /// A compare-and-swap precondition did not hold.
    #[error("conflict: {0}")]
    Conflict(&'static str),
    /// The event tail moved between chain verification and the append.
    #[error("tail moved")]
    TailMoved,
    #[error("already exists")]
    AlreadyExists,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Partial session update.  Only `Some` fields are written; the write is
/// atomic per record.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub awaiting_answer: Option<bool>,
    pub precheck: Option<serde_json::Value>,
    pub pause_reason: Option<String>,
    pub end_code: Option<String>,
    pub sealed_at: Option<DateTime<Utc>>,
}

impl SessionPatch {
    pub fn awaiting_answer(mut self, v: bool) -> Self {
        self.awaiting_answer = Some(v);
        self
    }

    pub fn precheck(mut self, checks: serde_json::Value) -> Self {
        self.precheck = Some(checks);
        self
    }

    pub fn pause_reason(mut self, reason: impl Into<String>) -> Self {
        self.pause_reason = Some(reason.into());
        self
    }

    pub fn end_code(mut self, code: impl Into<String>) -> Self {
        self.end_code = Some(code.into());
        self
    }

    pub fn sealed_at(mut self, at: DateTime<Utc>) -> Self {
        self.sealed_at = Some(at);
        self
    }

    pub(crate) fn apply(&self, session: &mut Session) {
        if let Some(v) = self.awaiting_answer {
            session.awaiting_answer = v;
        }
        if let Some(ref v) = self.precheck {
            session.precheck = Some(v.clone());
        }
        if let Some(ref v) = self.pause_reason {
            session.pause_reason = Some(v.clone());
        }
        if let Some(ref v) = self.end_code {
            session.end_code = Some(v.clone());
        }
        if let Some(v) = self.sealed_at {
            session.sealed_at = Some(v);
        }
    }
}

/// Result of [`Store::claim_question_slot`] — the one operation that
/// serializes concurrent `next-question` callers.
#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The slot was claimed; the returned session reflects the increment.
    Claimed(Session),
    /// Session is not Active.
    NotActive(SessionState),
    /// An earlier question is still unanswered.
    AwaitingAnswer,
    /// `askedCount` already reached the configured question count.
    QuotaExhausted,
    /// Asked again within the pacing window; seconds since the last ask.
    Paced { since_last_secs: i64 },
}

/// Transactional collection of session-owned records.
///
/// Implementations must make each method atomic with respect to the records
/// it touches: concurrent callers observe either the state before or after a
/// call, never a torn intermediate.
#[async_trait]
pub trait Store: Send + Sync {
    // ── Sessions ──────────────────────────────────────────────────────────────

    async fn insert_session(&self, session: Session) -> Result<(), StoreError>;

    async fn session(&self, id: &str) -> Result<Session, StoreError>;

    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session, StoreError>;

    /// Atomically transition `state` from any of `from` to `to`, applying
    /// `patch` in the same write.  Fails with [`StoreError::Conflict`] when
    /// the current state is not in `from`.
    async fn cas_state(
        &self,
        id: &str,
        from: &[SessionState],
        to: SessionState,
        patch: SessionPatch,
    ) -> Result<Session, StoreError>;

    /// Atomically claim the next question slot: requires state Active, no
    /// outstanding answer, remaining quota, and at least `min_gap_secs`
    /// since the previous ask.  On success increments `askedCount`, sets
    /// `awaitingAnswer` and `lastAskedAt` in one write.
    async fn claim_question_slot(
        &self,
        id: &str,
        min_gap_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError>;

    /// Add `deltas` to the session's policy counters; returns the updated
    /// session.
    async fn inc_policy_counters(
        &self,
        id: &str,
        deltas: &[(String, u32)],
    ) -> Result<Session, StoreError>;

    // ── Questions ─────────────────────────────────────────────────────────────

    async fn insert_question(&self, question: Question) -> Result<(), StoreError>;

    /// All questions of a session, ordered by number.
    async fn questions(&self, session_id: &str) -> Result<Vec<Question>, StoreError>;

    async fn question(&self, session_id: &str, question_id: &str)
        -> Result<Question, StoreError>;

    // ── Answers ───────────────────────────────────────────────────────────────

    async fn insert_answer(&self, answer: Answer) -> Result<(), StoreError>;

    /// All answers of a session, ordered by creation time.
    async fn answers(&self, session_id: &str) -> Result<Vec<Answer>, StoreError>;

    async fn set_answer_feedback(
        &self,
        session_id: &str,
        answer_id: &str,
        feedback: Feedback,
    ) -> Result<(), StoreError>;

    // ── Event chain ───────────────────────────────────────────────────────────

    /// Highest-seq event of the session; `(0, "")` when the log is empty.
    async fn event_tail(&self, session_id: &str) -> Result<ChainTail, StoreError>;

    /// Append a verified, enriched batch in one transaction.  The stored
    /// tail must still be `expected_tail_seq`, otherwise the batch was
    /// verified against a stale tail and the append fails with
    /// [`StoreError::TailMoved`] without writing anything.
    async fn append_events(
        &self,
        session_id: &str,
        expected_tail_seq: u64,
        events: Vec<ChainedEvent>,
    ) -> Result<ChainTail, StoreError>;

    /// Full event log ordered by seq.
    async fn events(&self, session_id: &str) -> Result<Vec<ChainedEvent>, StoreError>;

    // ── Strikes ───────────────────────────────────────────────────────────────

    async fn insert_strikes(&self, strikes: Vec<Strike>) -> Result<(), StoreError>;

    async fn strikes(&self, session_id: &str) -> Result<Vec<Strike>, StoreError>;

    // ── Summaries ─────────────────────────────────────────────────────────────

    /// Insert the session summary.  At most one per session; a second insert
    /// fails with [`StoreError::AlreadyExists`].
    async fn insert_summary(&self, summary: Summary) -> Result<(), StoreError>;

    async fn summary(&self, session_id: &str) -> Result<Summary, StoreError>;
}
