// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session lifecycle states.  Transitions are enforced by the engine's FSM;
/// the store only records the current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    PendingPrecheck,
    Ready,
    Active,
    Paused,
    Completed,
    Ended,
}

impl SessionState {
    /// Terminal sessions reject every mutating operation except summary reads.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Ended)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::PendingPrecheck => "PendingPrecheck",
            SessionState::Ready => "Ready",
            SessionState::Active => "Active",
            SessionState::Paused => "Paused",
            SessionState::Completed => "Completed",
            SessionState::Ended => "Ended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Adaptive,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Adaptive => "adaptive",
        }
    }
}

/// Configuration snapshot taken at session creation.  Field names are the
/// wire names used by the browser client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub role_category: String,
    #[serde(default)]
    pub role_sub_type: Option<String>,
    pub experience_years: u32,
    pub experience_months: u32,
    pub modes: Vec<String>,
    pub question_count: u32,
    pub duration_limit: u32,
    pub language: String,
    #[serde(default)]
    pub accent_preference: Option<String>,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub resume_file_ref: Option<String>,
    #[serde(default)]
    pub company_targets: Vec<String>,
    #[serde(default = "crate::records::default_true")]
    pub include_curated_questions: bool,
    #[serde(default = "crate::records::default_true")]
    pub allow_ai_generated: bool,
    #[serde(default)]
    pub enable_mcq: Option<bool>,
    #[serde(default)]
    pub enable_fib: Option<bool>,
    pub consent_recording: bool,
    pub consent_anti_cheat: bool,
    pub consent_timestamp: String,
}

pub(crate) fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub state: SessionState,
    pub config: SessionConfig,
    pub asked_count: u32,
    pub awaiting_answer: bool,
    #[serde(default)]
    pub last_asked_at: Option<DateTime<Utc>>,
    /// Event-type → strike count, maintained by the policy evaluator.
    #[serde(default)]
    pub policy_counters: HashMap<String, u32>,
    #[serde(default)]
    pub precheck: Option<serde_json::Value>,
    #[serde(default)]
    pub pause_reason: Option<String>,
    #[serde(default)]
    pub end_code: Option<String>,
    #[serde(default)]
    pub sealed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, user_id: String, config: SessionConfig, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            state: SessionState::PendingPrecheck,
            config,
            asked_count: 0,
            awaiting_answer: false,
            last_asked_at: None,
            policy_counters: HashMap::new(),
            precheck: None,
            pause_reason: None,
            end_code: None,
            sealed_at: None,
            created_at: now,
        }
    }

    pub fn counter(&self, event_type: &str) -> u32 {
        self.policy_counters.get(event_type).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Behavioral,
    Coding,
    Mcq,
    Fib,
    Scenario,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Behavioral => "behavioral",
            QuestionType::Coding => "coding",
            QuestionType::Mcq => "mcq",
            QuestionType::Fib => "fib",
            QuestionType::Scenario => "scenario",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub session_id: String,
    /// 1-based position; unique per session, strictly increasing.
    pub number: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    /// Type-specific metadata: difficulty, hintAvailable, options, fillSlots,
    /// tests, functionName, …
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    Voice,
    Text,
    Code,
    Mcq,
    Fib,
}

impl AnswerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerType::Voice => "voice",
            AnswerType::Text => "text",
            AnswerType::Code => "code",
            AnswerType::Mcq => "mcq",
            AnswerType::Fib => "fib",
        }
    }
}

/// Per-question feedback produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    /// 0–100.
    pub score: u32,
    pub feedback: String,
    pub model_answer: String,
}

/// A submitted answer.  The discriminator is `answer_type`; per-variant
/// payload fields are optional and validated against the discriminator at
/// the API boundary.  Multiple answers per question are allowed — the latest
/// by `created_at` is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: String,
    pub session_id: String,
    pub question_id: String,
    pub answer_type: AnswerType,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub audio_ref: Option<String>,
    #[serde(default)]
    pub code_ref: Option<String>,
    #[serde(default)]
    pub mcq_selected: Option<Vec<String>>,
    #[serde(default)]
    pub fib_entries: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub transcripts: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub time_spent: Option<i64>,
    #[serde(default)]
    pub code_tests: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub immediate_feedback: Option<Feedback>,
    pub created_at: DateTime<Utc>,
}

/// One link of the hash-chained anti-cheat log, after server enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainedEvent {
    pub id: String,
    pub session_id: String,
    /// Strictly monotonically increasing per session; gaps allowed.
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub details: serde_json::Value,
    /// Client timestamp, opaque to the server.
    pub ts: String,
    pub prev_hash: String,
    /// Server-computed SHA-256 over the chain recipe.
    pub hash: String,
    pub created_at: DateTime<Utc>,
}

/// Chain tail: the highest-seq event of a session.  `(0, "")` when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTail {
    pub seq: u64,
    pub hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Yellow,
    Red,
}

/// Policy-classified anti-cheat violation derived from a chained event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strike {
    pub id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub strike_type: String,
    pub severity: Severity,
    pub ts: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// 0–5 per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub communication: u8,
    pub problem_solving: u8,
    pub technical: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// 0–100.
    pub overall: u32,
    /// Raw provider output kept for audit, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryData {
    pub rubric: Rubric,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub score_breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerQuestion {
    pub question_id: String,
    pub number: u32,
    pub score: u32,
    pub feedback: String,
    pub model_answer: String,
}

/// Final session report; created once, on the Completed or Ended transition,
/// immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: String,
    pub session_id: String,
    pub summary: SummaryData,
    pub per_question: Vec<PerQuestion>,
    pub created_at: DateTime<Utc>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
