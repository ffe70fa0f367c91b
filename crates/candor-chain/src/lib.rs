// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Tamper-evident anti-cheat event log.
//!
//! Every event a client emits links to its predecessor:
//!
//! ```text
//! hash[i] = SHA-256(sessionId ∥ seq ∥ type ∥ ts ∥ canonicalJSON(details) ∥ prevHash)
//! prevHash[i] = hash[i-1]            ("" for the first event of a session)
//! seq[i]      > seq[i-1]             (gaps allowed, order strict)
//! ```
//!
//! [`verify_batch`] checks an incoming batch against the stored tail and
//! returns server-enriched records ready for a transactional append.  A
//! replayed batch fails the seq check; a batch whose `prevHash` does not
//! match the running chain fails the link check.  Either way nothing is
//! written, so ingestion is idempotent-by-failure.

mod canonical;

pub use canonical::canonical_json;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use candor_store::{new_id, ChainTail, ChainedEvent};

/// Chain verification failures, named by their wire error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The batch's first seq does not exceed the stored tail seq, or seqs
    /// within the batch are not strictly increasing.
    #[error("event_seq_replay_or_out_of_order")]
    ReplayOrOutOfOrder,
    /// An event's `prevHash` does not match the running chain hash.
    #[error("event_chain_broken")]
    Broken,
}

impl ChainError {
    pub fn code(&self) -> &'static str {
        match self {
            ChainError::ReplayOrOutOfOrder => "event_seq_replay_or_out_of_order",
            ChainError::Broken => "event_chain_broken",
        }
    }
}

/// Client-submitted event, before enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingEvent {
    pub session_id: String,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub details: serde_json::Value,
    pub ts: String,
    pub prev_hash: String,
}

/// SHA-256 over the chain recipe, hex-encoded.
pub fn event_hash(
    session_id: &str,
    seq: u64,
    event_type: &str,
    ts: &str,
    details: &serde_json::Value,
    prev_hash: &str,
) -> String {
    let mut digest = Sha256::new();
    digest.update(session_id.as_bytes());
    digest.update(seq.to_string().as_bytes());
    digest.update(event_type.as_bytes());
    digest.update(ts.as_bytes());
    digest.update(canonical_json(details).as_bytes());
    digest.update(prev_hash.as_bytes());
    hex::encode(digest.finalize())
}

/// Verify an incoming batch against the stored `tail` and enrich it.
///
/// The batch is sorted by seq, then each link is checked and hashed in
/// order.  On success the returned records carry fresh ids, server-computed
/// hashes, and `created_at = now`; the caller appends them atomically
/// (re-checking the tail) and broadcasts whatever the policy layer derives.
///
/// An empty batch verifies trivially and returns no records.
pub fn verify_batch(
    session_id: &str,
    tail: &ChainTail,
    mut events: Vec<IncomingEvent>,
    now: DateTime<Utc>,
) -> Result<Vec<ChainedEvent>, ChainError> {
    if events.is_empty() {
        return Ok(Vec::new());
    }
    events.sort_by_key(|e| e.seq);

    if events[0].seq <= tail.seq {
        return Err(ChainError::ReplayOrOutOfOrder);
    }
    // sort_by_key leaves duplicate seqs adjacent; equal neighbours violate
    // strict monotonicity.
    if events.windows(2).any(|w| w[0].seq == w[1].seq) {
        return Err(ChainError::ReplayOrOutOfOrder);
    }

    let mut running_prev = tail.hash.clone();
    let mut enriched = Vec::with_capacity(events.len());
    for ev in events {
        if ev.prev_hash != running_prev {
            return Err(ChainError::Broken);
        }
        let hash = event_hash(
            session_id,
            ev.seq,
            &ev.event_type,
            &ev.ts,
            &ev.details,
            &running_prev,
        );
        running_prev = hash.clone();
        enriched.push(ChainedEvent {
            id: new_id(),
            session_id: session_id.to_string(),
            seq: ev.seq,
            event_type: ev.event_type,
            details: ev.details,
            ts: ev.ts,
            prev_hash: ev.prev_hash,
            hash,
            created_at: now,
        });
    }
    Ok(enriched)
}

/// Re-derive every hash of a stored log and check the links.  Used by audits
/// and tests; ingestion never stores an unverified event in the first place.
pub fn verify_log(session_id: &str, events: &[ChainedEvent]) -> Result<(), ChainError> {
    let mut running_prev = String::new();
    let mut last_seq = 0u64;
    for ev in events {
        if ev.seq <= last_seq && last_seq != 0 {
            return Err(ChainError::ReplayOrOutOfOrder);
        }
        if ev.prev_hash != running_prev {
            return Err(ChainError::Broken);
        }
        let expect = event_hash(
            session_id,
            ev.seq,
            &ev.event_type,
            &ev.ts,
            &ev.details,
            &running_prev,
        );
        if ev.hash != expect {
            return Err(ChainError::Broken);
        }
        running_prev = ev.hash.clone();
        last_seq = ev.seq;
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
