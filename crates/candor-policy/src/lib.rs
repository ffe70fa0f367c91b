// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Policy engine that turns chained anti-cheat events into strikes and
//! decides when a session is paused or sealed.
//!
//! Classification is per event; threshold evaluation runs once per ingested
//! batch, over the session's accumulated counters.  The engine applies the
//! verdict — this crate never touches the store or the broadcast bus.

use std::collections::HashMap;

use candor_config::PolicyConfig;
use candor_store::{ChainedEvent, SessionState, Severity};

/// Event types that qualify for strike classification.
pub const SCREENSHOT_ATTEMPT: &str = "SCREENSHOT_ATTEMPT";
pub const FS_EXIT: &str = "FS_EXIT";
pub const TAB_SWITCH: &str = "TAB_SWITCH";
pub const FACE_MISSING: &str = "FACE_MISSING";

/// Derived counter key tracking only red FACE_MISSING strikes; the plain
/// event-type key counts every strike of that type.
pub const FACE_MISSING_RED: &str = "FACE_MISSING_RED";

/// A classified strike before the engine assigns it an id.
#[derive(Debug, Clone, PartialEq)]
pub struct StrikeDraft {
    pub strike_type: String,
    pub severity: Severity,
    pub ts: String,
    pub details: serde_json::Value,
}

/// Classify one event.  Returns `None` for event types the policy ignores.
pub fn classify(config: &PolicyConfig, event: &ChainedEvent) -> Option<StrikeDraft> {
    let severity = match event.event_type.as_str() {
        SCREENSHOT_ATTEMPT => Severity::Red,
        FS_EXIT | TAB_SWITCH => Severity::Yellow,
        FACE_MISSING => {
            if face_missing_duration(&event.details) <= config.face_missing_red_secs {
                Severity::Yellow
            } else {
                Severity::Red
            }
        }
        _ => return None,
    };
    Some(StrikeDraft {
        strike_type: event.event_type.clone(),
        severity,
        ts: event.ts.clone(),
        details: event.details.clone(),
    })
}

/// Client-supplied `details.duration` in seconds.  Accepts numbers and
/// numeric strings; anything missing or unparsable counts as 0 (yellow).
pub fn face_missing_duration(details: &serde_json::Value) -> f64 {
    match details.get("duration") {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Counter increments for a batch of freshly classified strikes.
pub fn counter_deltas(strikes: &[StrikeDraft]) -> Vec<(String, u32)> {
    let mut deltas: HashMap<String, u32> = HashMap::new();
    for strike in strikes {
        *deltas.entry(strike.strike_type.clone()).or_insert(0) += 1;
        if strike.strike_type == FACE_MISSING && strike.severity == Severity::Red {
            *deltas.entry(FACE_MISSING_RED.into()).or_insert(0) += 1;
        }
    }
    let mut out: Vec<_> = deltas.into_iter().collect();
    out.sort();
    out
}

/// Batch-level decision: what the engine must do after counters are updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    /// Auto-pause reason (`fs_exit`), when the session must leave Active.
    pub pause_reason: Option<&'static str>,
    /// Seal reason, when the session must be Ended.
    pub end_code: Option<&'static str>,
    /// The tab-switch limit was crossed in this batch: record one red
    /// escalation strike (warning only, no seal).
    pub tab_escalation: bool,
}

fn count(counters: &HashMap<String, u32>, key: &str) -> u32 {
    counters.get(key).copied().unwrap_or(0)
}

/// Evaluate thresholds for one ingested batch.
///
/// `before`/`after` are the session's policy counters around the batch's
/// increments; `new_strikes` are the strikes classified from this batch.
/// Sealing only applies to sessions that are Active or Paused — the FSM has
/// no seal edge from the other states — and pausing only to Active ones.
pub fn evaluate(
    config: &PolicyConfig,
    state: SessionState,
    before: &HashMap<String, u32>,
    after: &HashMap<String, u32>,
    new_strikes: &[StrikeDraft],
) -> Verdict {
    let mut verdict = Verdict::default();
    let sealable = matches!(state, SessionState::Active | SessionState::Paused);

    if sealable
        && config.seal_on_screenshot
        && new_strikes
            .iter()
            .any(|s| s.strike_type == SCREENSHOT_ATTEMPT && s.severity == Severity::Red)
    {
        verdict.end_code = Some("screenshot_attempt");
    }

    if state == SessionState::Active && count(after, FS_EXIT) >= config.fs_exit_pause_at {
        verdict.pause_reason = Some("fs_exit");
    }
    if sealable && count(after, FS_EXIT) >= config.fs_exit_seal_at {
        verdict.end_code = verdict.end_code.or(Some("fs_exit_excess"));
    }
    if sealable && count(after, FACE_MISSING_RED) >= config.face_missing_seal_at {
        verdict.end_code = verdict.end_code.or(Some("face_missing"));
    }

    // Single escalation when the limit is crossed, no matter how many
    // switches the crossing batch carried.
    if count(after, TAB_SWITCH) > config.tab_switch_limit
        && count(before, TAB_SWITCH) <= config.tab_switch_limit
    {
        verdict.tab_escalation = true;
    }

    // A seal supersedes a pause.
    if verdict.end_code.is_some() {
        verdict.pause_reason = None;
    }
    verdict
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
