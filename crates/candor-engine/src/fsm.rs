// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! The session state machine:
//!
//! ```text
//! PendingPrecheck --precheck(pass|warning)--> Ready
//! Ready           --start-------------------> Active
//! Active          --finalize----------------> Completed
//! Active          --policy auto-pause-------> Paused
//! Paused          --precheck(pass)----------> Ready
//! Active|Paused   --policy auto-seal--------> Ended
//! ```
//!
//! Transitions are committed with compare-and-swap against these source
//! lists, so a raced handler loses cleanly with `invalid_state` instead of
//! clobbering a concurrent transition.

use candor_store::SessionState;

use SessionState::*;

/// States from which a precheck may move the session to Ready.
pub const PRECHECK_SOURCES: &[SessionState] = &[PendingPrecheck, Paused];

/// States from which the interview may start.
pub const START_SOURCES: &[SessionState] = &[Ready];

/// States from which the candidate may finalize.
pub const FINALIZE_SOURCES: &[SessionState] = &[Active];

/// States from which the policy may auto-pause.
pub const PAUSE_SOURCES: &[SessionState] = &[Active];

/// States from which the policy may auto-seal.
pub const SEAL_SOURCES: &[SessionState] = &[Active, Paused];

/// Full transition relation; everything not listed is `invalid_state`.
pub fn transition_allowed(from: SessionState, to: SessionState) -> bool {
    matches!(
        (from, to),
        (PendingPrecheck, Ready)
            | (Paused, Ready)
            | (Ready, Active)
            | (Active, Completed)
            | (Active, Paused)
            | (Active, Ended)
            | (Paused, Ended)
    )
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[SessionState] = &[PendingPrecheck, Ready, Active, Paused, Completed, Ended];

    #[test]
    fn the_seven_edges_are_allowed() {
        for (from, to) in [
            (PendingPrecheck, Ready),
            (Paused, Ready),
            (Ready, Active),
            (Active, Completed),
            (Active, Paused),
            (Active, Ended),
            (Paused, Ended),
        ] {
            assert!(transition_allowed(from, to), "{from:?} → {to:?}");
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for &from in &[Completed, Ended] {
            for &to in ALL {
                assert!(!transition_allowed(from, to), "{from:?} → {to:?}");
            }
        }
    }

    #[test]
    fn no_shortcut_into_active() {
        assert!(!transition_allowed(PendingPrecheck, Active));
        assert!(!transition_allowed(Paused, Active));
    }

    #[test]
    fn source_lists_agree_with_the_relation() {
        for &from in PRECHECK_SOURCES {
            assert!(transition_allowed(from, Ready));
        }
        for &from in START_SOURCES {
            assert!(transition_allowed(from, Active));
        }
        for &from in FINALIZE_SOURCES {
            assert!(transition_allowed(from, Completed));
        }
        for &from in PAUSE_SOURCES {
            assert!(transition_allowed(from, Paused));
        }
        for &from in SEAL_SOURCES {
            assert!(transition_allowed(from, Ended));
        }
    }
}
