// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

/// Process-scoped revocation set: jti → (revokedAt, reason, expiry).
///
/// Entries outlive the tokens they revoke — each entry carries its own
/// expiry, set at revocation time to at least the revoked token's `exp`,
/// and is dropped lazily on the next lookup or purge.
#[derive(Debug, Default)]
pub struct RevocationSet {
    inner: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    revoked_at: i64,
    reason: String,
    expires_at: i64,
}

impl RevocationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a jti.  `expires_at` must be ≥ the token's own `exp` so the
    /// entry cannot age out while the token is still otherwise valid.
    pub fn revoke(&self, jti: &str, reason: &str, revoked_at: i64, expires_at: i64) {
        let mut map = self.inner.lock().expect("revocation set poisoned");
        map.insert(
            jti.to_string(),
            Entry {
                revoked_at,
                reason: reason.to_string(),
                expires_at,
            },
        );
    }

    /// True if the jti is currently revoked.
    pub fn contains(&self, jti: &str, now: i64) -> bool {
        let map = self.inner.lock().expect("revocation set poisoned");
        map.get(jti).map(|e| e.expires_at > now).unwrap_or(false)
    }

    /// Drop expired entries; returns how many were removed.
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut map = self.inner.lock().expect("revocation set poisoned");
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        before - map.len()
    }

    /// (revokedAt, reason) for a revoked jti, if present.
    pub fn entry(&self, jti: &str) -> Option<(i64, String)> {
        let map = self.inner.lock().expect("revocation set poisoned");
        map.get(jti).map(|e| (e.revoked_at, e.reason.clone()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("revocation set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
