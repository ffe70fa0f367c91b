// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Minimal sandbox for candidate-submitted Python.
//!
//! Defence layers, in order:
//!
//! 1. A substring pre-screen rejects code that mentions imports, file or
//!    process access before anything runs (`disallowed_code`).
//! 2. Each test case runs in its **own** interpreter subprocess whose
//!    `exec` globals expose only an allowlist of harmless builtins — no
//!    `__import__`, no `open`, no module machinery.  Nothing is shared
//!    between test cases.
//! 3. A hard wall-clock deadline per test case; on expiry the subprocess is
//!    killed and the test records `error: "timeout"`.
//!
//! This is an interview aid, not a hostile-multi-tenant jail: the process
//! boundary plus the builtins allowlist is proportionate to candidates
//! poking at an exercise, and the evaluator never feeds results back into
//! anything privileged.

mod screen;

pub use screen::screen;

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use candor_config::SandboxConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SandboxError {
    #[error("disallowed_code")]
    DisallowedCode,
}

/// One test case: `input` is the argument list (splatted when it is an
/// array) and `expected` is compared by value equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default = "empty_input")]
    pub input: serde_json::Value,
    #[serde(default)]
    pub expected: serde_json::Value,
}

fn empty_input() -> serde_json::Value {
    serde_json::Value::Array(vec![])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub input: serde_json::Value,
    pub expected: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<serde_json::Value>,
    pub pass: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub total: usize,
}

/// In-child harness.  Runs with full builtins itself; the candidate code is
/// exec'd with the restricted globals only.  Exactly one JSON line comes
/// back on stdout.
const WORKER: &str = r#"
import json, sys

ALLOWED = {
    "len": len, "range": range, "list": list, "dict": dict, "set": set,
    "sum": sum, "min": min, "max": max, "sorted": sorted,
    "enumerate": enumerate, "abs": abs, "all": all, "any": any,
}

def run():
    payload = json.loads(sys.stdin.read())
    g = {"__builtins__": ALLOWED}
    l = {}
    try:
        exec(payload["code"], g, l)
        fn = l.get(payload["function"]) or g.get(payload["function"])
        if not callable(fn):
            print(json.dumps({"error": "function_not_found"}))
            return
        inp = payload["input"]
        actual = fn(*inp) if isinstance(inp, list) else fn(inp)
        ok = actual == payload["expected"]
        try:
            print(json.dumps({"actual": actual, "pass": ok}))
        except Exception:
            print(json.dumps({"actual": repr(actual), "pass": ok}))
    except Exception as e:
        print(json.dumps({"error": str(e)}))

run()
"#;

/// Runs candidate code against test cases, one subprocess per case.
pub struct CodeEvaluator {
    python_bin: String,
    timeout: Duration,
}

impl CodeEvaluator {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            python_bin: config.python_bin.clone(),
            timeout: Duration::from_millis(config.test_timeout_ms),
        }
    }

    /// Pre-screen the code, then run every test case.  Per-test failures
    /// (wrong output, runtime error, timeout) land in the report; only the
    /// pre-screen rejects the whole request.
    pub async fn evaluate(
        &self,
        code: &str,
        function_name: &str,
        tests: &[TestCase],
    ) -> Result<EvalReport, SandboxError> {
        screen(code)?;

        let mut results = Vec::with_capacity(tests.len());
        let mut passed = 0;
        for test in tests {
            let result = self.run_one(code, function_name, test).await;
            if result.pass {
                passed += 1;
            }
            results.push(result);
        }
        Ok(EvalReport {
            total: results.len(),
            results,
            passed,
        })
    }

    async fn run_one(&self, code: &str, function_name: &str, test: &TestCase) -> TestResult {
        let payload = serde_json::json!({
            "code": code,
            "function": function_name,
            "input": test.input,
            "expected": test.expected,
        });

        let spawned = Command::new(&self.python_bin)
            .arg("-c")
            .arg(WORKER)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            // Dropping the wait future on timeout must take the interpreter
            // down with it.
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => return self.errored(test, format!("spawn failed: {e}")),
        };

        if let Some(mut stdin) = child.stdin.take() {
            if stdin.write_all(payload.to_string().as_bytes()).await.is_err() {
                return self.errored(test, "worker rejected input".into());
            }
            // Close stdin so the worker's read() returns.
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return self.errored(test, format!("worker failed: {e}")),
            Err(_) => {
                debug!(function = function_name, "test case hit the wall-clock limit");
                return self.errored(test, "timeout".into());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout.lines().last().unwrap_or("");
        let parsed: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => return self.errored(test, "no_result".into()),
        };

        if let Some(error) = parsed.get("error").and_then(|e| e.as_str()) {
            return self.errored(test, error.to_string());
        }
        let pass = parsed.get("pass").and_then(|p| p.as_bool()).unwrap_or(false);
        TestResult {
            input: test.input.clone(),
            expected: test.expected.clone(),
            actual: parsed.get("actual").cloned(),
            pass,
            error: None,
        }
    }

    fn errored(&self, test: &TestCase, error: String) -> TestResult {
        TestResult {
            input: test.input.clone(),
            expected: test.expected.clone(),
            actual: None,
            pass: false,
            error: Some(error),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> CodeEvaluator {
        CodeEvaluator::new(&SandboxConfig::default())
    }

    fn case(input: serde_json::Value, expected: serde_json::Value) -> TestCase {
        TestCase { input, expected }
    }

    #[tokio::test]
    async fn sorted_solution_passes_all_tests() {
        let report = evaluator()
            .evaluate(
                "def solve(a): return sorted(a)",
                "solve",
                &[
                    case(serde_json::json!([[3, 1, 2]]), serde_json::json!([1, 2, 3])),
                    case(serde_json::json!([[]]), serde_json::json!([])),
                ],
            )
            .await
            .unwrap();
        assert_eq!(report.passed, 2);
        assert_eq!(report.total, 2);
        assert!(report.results.iter().all(|r| r.pass));
        assert_eq!(report.results[0].actual, Some(serde_json::json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn wrong_output_fails_the_case() {
        let report = evaluator()
            .evaluate(
                "def solve(a): return a",
                "solve",
                &[case(serde_json::json!([[2, 1]]), serde_json::json!([1, 2]))],
            )
            .await
            .unwrap();
        assert_eq!(report.passed, 0);
        assert!(!report.results[0].pass);
        assert!(report.results[0].error.is_none());
    }

    #[tokio::test]
    async fn infinite_loop_times_out() {
        let report = evaluator()
            .evaluate(
                "def solve(a):\n    while True:\n        pass",
                "solve",
                &[case(serde_json::json!([1]), serde_json::json!(1))],
            )
            .await
            .unwrap();
        assert_eq!(report.passed, 0);
        assert_eq!(report.results[0].error.as_deref(), Some("timeout"));
        assert!(!report.results[0].pass);
    }

    #[tokio::test]
    async fn missing_function_is_reported() {
        let report = evaluator()
            .evaluate(
                "def other(a): return a",
                "solve",
                &[case(serde_json::json!([1]), serde_json::json!(1))],
            )
            .await
            .unwrap();
        assert_eq!(
            report.results[0].error.as_deref(),
            Some("function_not_found")
        );
    }

    #[tokio::test]
    async fn runtime_errors_are_captured_per_case() {
        let report = evaluator()
            .evaluate(
                "def solve(a): return a[10]",
                "solve",
                &[case(serde_json::json!([[1]]), serde_json::json!(1))],
            )
            .await
            .unwrap();
        assert!(!report.results[0].pass);
        assert!(report.results[0].error.is_some());
    }

    #[tokio::test]
    async fn scalar_input_is_passed_as_single_argument() {
        let report = evaluator()
            .evaluate(
                "def solve(n): return n + 1",
                "solve",
                &[case(serde_json::json!(41), serde_json::json!(42))],
            )
            .await
            .unwrap();
        assert_eq!(report.passed, 1);
    }

    #[tokio::test]
    async fn builtins_outside_the_allowlist_are_unavailable() {
        // `globals` passes the textual screen but is not allowlisted, so the
        // worker raises NameError at call time.
        let sneaky = "def solve(a):\n    return globals()";
        let report = evaluator()
            .evaluate(sneaky, "solve", &[case(serde_json::json!([1]), serde_json::json!(1))])
            .await
            .unwrap();
        assert_eq!(report.passed, 0);
        let error = report.results[0].error.as_deref().unwrap_or_default();
        assert!(error.contains("globals"), "got: {error}");
    }

    #[tokio::test]
    async fn disallowed_code_never_spawns() {
        let err = evaluator()
            .evaluate("import os\n", "solve", &[])
            .await
            .unwrap_err();
        assert_eq!(err, SandboxError::DisallowedCode);
    }
}
