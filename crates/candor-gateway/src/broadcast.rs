// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Per-room WebSocket fan-out.
//!
//! Rooms are keyed `session:<id>`.  Each subscriber is an unbounded channel
//! drained by its connection's send loop, so `emit` never blocks on a slow
//! client.  Delivery within a room is FIFO by emit order.  Nothing is
//! persisted — a listener that joins late has missed whatever came before.
//!
//! Emits iterate under the read lock; a send failure means the receiving
//! task is gone, and those subscribers are reaped under the write lock once
//! the iteration is done.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::debug;

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
pub struct BroadcastBus {
    rooms: RwLock<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl BroadcastBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a room.  Returns the subscriber id (for `leave`) and the
    /// message stream to drain.
    pub fn join(&self, room: &str) -> (u64, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut rooms = self.rooms.write().expect("broadcast bus poisoned");
        rooms
            .entry(room.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        (id, rx)
    }

    pub fn leave(&self, room: &str, id: u64) {
        let mut rooms = self.rooms.write().expect("broadcast bus poisoned");
        if let Some(subs) = rooms.get_mut(room) {
            subs.retain(|s| s.id != id);
            if subs.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Deliver a message to every live subscriber of the room.  Returns the
    /// number of subscribers reached.
    pub fn emit(&self, room: &str, message: &serde_json::Value) -> usize {
        let text = message.to_string();
        let mut delivered = 0;
        let mut dead = Vec::new();
        {
            let rooms = self.rooms.read().expect("broadcast bus poisoned");
            let Some(subs) = rooms.get(room) else {
                return 0;
            };
            for sub in subs {
                if sub.tx.send(text.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(sub.id);
                }
            }
        }
        if !dead.is_empty() {
            debug!(room, reaped = dead.len(), "removing dead subscribers");
            let mut rooms = self.rooms.write().expect("broadcast bus poisoned");
            if let Some(subs) = rooms.get_mut(room) {
                subs.retain(|s| !dead.contains(&s.id));
                if subs.is_empty() {
                    rooms.remove(room);
                }
            }
        }
        delivered
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms
            .read()
            .expect("broadcast bus poisoned")
            .get(room)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
