// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Deterministic producers used whenever a provider is missing, slow, or
//! broken.  Output depends only on the session configuration, so the same
//! session always degrades to the same questions and scores.

use candor_store::{
    Answer, AnswerType, Difficulty, Feedback, Question, QuestionType, Rubric, ScoreBreakdown,
    SessionConfig, SummaryData,
};

use crate::provider::GeneratedQuestion;

/// Question bank keyed by the first configured mode.
pub fn fallback_question(
    config: &SessionConfig,
    remaining: u32,
    difficulty: Difficulty,
) -> GeneratedQuestion {
    let mode = config
        .modes
        .first()
        .map(|m| m.to_ascii_lowercase())
        .unwrap_or_else(|| "behavioral".into());
    let role = &config.role_category;
    let number = config.question_count.saturating_sub(remaining) + 1;

    match mode.as_str() {
        "coding" | "code" => GeneratedQuestion {
            question_type: QuestionType::Coding,
            text: "Write a function to find all duplicates in an array of integers.".into(),
            metadata: serde_json::json!({
                "difficulty": difficulty.as_str(),
                "hintAvailable": true,
                "language": "python",
                "functionName": "find_duplicates",
                "functionSignature": "def find_duplicates(arr):\n    # your code\n    pass",
                "tests": [
                    {"input": [[1, 2, 3, 2, 4, 1]], "expected": [1, 2]},
                    {"input": [[5, 5, 5]], "expected": [5]},
                    {"input": [[1, 2, 3]], "expected": []},
                ],
            }),
        },
        "mcq" => GeneratedQuestion {
            question_type: QuestionType::Mcq,
            text: "Which of the following statements about Big-O notation are true?".into(),
            metadata: serde_json::json!({
                "difficulty": difficulty.as_str(),
                "hintAvailable": true,
                "options": [
                    "O(n log n) grows slower than O(n^2)",
                    "O(1) means constant time regardless of input size",
                    "O(n) always faster than O(log n)",
                    "O(2^n) is polynomial time",
                ],
                "multiple": true,
            }),
        },
        "fib" | "fill" => GeneratedQuestion {
            question_type: QuestionType::Fib,
            text: "Fill in the blanks for the HTTP status codes: ______ means Not Found, ______ means OK."
                .into(),
            metadata: serde_json::json!({
                "difficulty": difficulty.as_str(),
                "hintAvailable": true,
                "fillSlots": ["Not Found", "OK"],
            }),
        },
        "scenario" => GeneratedQuestion {
            question_type: QuestionType::Scenario,
            text: format!(
                "Your automated test suite is slow. Propose a plan to optimize it for the {role} role."
            ),
            metadata: serde_json::json!({
                "difficulty": difficulty.as_str(),
                "hintAvailable": true,
            }),
        },
        _ => GeneratedQuestion {
            question_type: QuestionType::Behavioral,
            text: format!(
                "Tell me about a time you solved a difficult problem in {role}. (Q{number})"
            ),
            metadata: serde_json::json!({
                "difficulty": difficulty.as_str(),
                "hintAvailable": true,
            }),
        },
    }
}

/// Length-heuristic feedback: longer answers score higher, capped at 100,
/// with type-appropriate guidance text.
pub fn fallback_feedback(_question: &Question, answer: Option<&Answer>) -> Feedback {
    let answer_text = answer
        .and_then(|a| a.response_text.as_deref())
        .unwrap_or("");
    let answer_type = answer.map(|a| a.answer_type).unwrap_or(AnswerType::Text);

    let score = if answer_text.is_empty() {
        40
    } else {
        let words = answer_text.split_whitespace().count() as u32;
        60 + words.min(400) / 10
    };

    let (feedback, model_answer) = match answer_type {
        AnswerType::Code => (
            "Consider correctness, complexity, edge cases, and readability. Add tests where relevant.",
            "Provide a correct, efficient solution with O(n) or better if applicable; discuss tradeoffs and edge cases.",
        ),
        AnswerType::Mcq => (
            "Review the selected choices and justify why they are correct; revisit the concept if unsure.",
            "State the correct option(s) with a brief explanation.",
        ),
        AnswerType::Fib => (
            "Fill each blank with precise terminology; ensure consistency with the question context.",
            "Provide the expected term/value per blank with a short rationale.",
        ),
        AnswerType::Text | AnswerType::Voice => (
            "Good start. Add concrete details, metrics, and structure (STAR).",
            "Include Situation, Task, Action, Result with metrics; for coding, discuss complexity and edge cases.",
        ),
    };

    Feedback {
        score,
        feedback: feedback.into(),
        model_answer: model_answer.into(),
    }
}

/// Neutral rubric used when the summarizer is unavailable.
pub fn fallback_summary() -> SummaryData {
    SummaryData {
        rubric: Rubric {
            communication: 3,
            problem_solving: 3,
            technical: 3,
        },
        strengths: vec!["Clear structure".into(), "Relevant examples".into()],
        gaps: vec!["More depth on metrics".into()],
        score_breakdown: ScoreBreakdown {
            overall: 75,
            raw: None,
        },
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
