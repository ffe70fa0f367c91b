// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Session records and the store seam.
//!
//! A [`Session`] exclusively owns its questions, answers, chained events,
//! strikes, and summary.  All persistence goes through the [`Store`] trait;
//! the engine never talks to a database driver directly.  [`MemoryStore`] is
//! the shipped implementation — a mutex-guarded in-process map with the same
//! atomicity guarantees a transactional document store would give:
//!
//! * per-record atomic updates,
//! * compare-and-swap on session state and question counters,
//! * transactional event-batch append that fails when the tail has moved.

mod memory;
mod records;
mod store;

pub use memory::MemoryStore;
pub use records::{
    Answer, AnswerType, ChainTail, ChainedEvent, Difficulty, Feedback, PerQuestion, Question,
    QuestionType, Rubric, ScoreBreakdown, Session, SessionConfig, SessionState, Severity, Strike,
    Summary, SummaryData,
};
pub use store::{ClaimOutcome, SessionPatch, Store, StoreError};

/// Opaque record id: hex-encoded UUIDv4, matching the ids clients see.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
