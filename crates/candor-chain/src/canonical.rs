// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeMap;

/// Deterministic JSON serialization used as SHA-256 input.
///
/// Rules: UTF-8; object keys recursively sorted lexicographically; compact
/// separators (no whitespace); numbers in serde_json's shortest round-trip
/// decimal form; `null`/`true`/`false` lowercased.  Two structurally equal
/// values always canonicalize to the same byte string, regardless of the
/// key order they were parsed with.
pub fn canonical_json(value: &serde_json::Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Null => out.push_str("null"),
        serde_json::Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        serde_json::Value::Number(n) => out.push_str(&n.to_string()),
        serde_json::Value::String(s) => {
            // serde_json's string formatter handles all escaping.
            out.push_str(&serde_json::Value::String(s.clone()).to_string());
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        serde_json::Value::Object(map) => {
            // Re-sort explicitly so canonical output does not depend on the
            // map implementation behind serde_json.
            let sorted: BTreeMap<&String, &serde_json::Value> = map.iter().collect();
            out.push('{');
            for (i, (key, val)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
