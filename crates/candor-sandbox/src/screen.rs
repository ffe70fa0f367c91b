// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use crate::SandboxError;

/// Substrings that reject a submission outright, checked case-insensitively.
/// Coarse on purpose: false positives are acceptable for interview answers,
/// false negatives are what the subprocess allowlist is for.
const BANNED: &[&str] = &[
    "import ",
    "__import__",
    "open(",
    "exec(",
    "eval(",
    "os.",
    "sys.",
    "subprocess",
    "socket",
    "thread",
    "fork",
    "spawn",
];

/// Reject code containing any banned substring.
pub fn screen(code: &str) -> Result<(), SandboxError> {
    let lowered = code.to_lowercase();
    for token in BANNED {
        if lowered.contains(token) {
            return Err(SandboxError::DisallowedCode);
        }
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
