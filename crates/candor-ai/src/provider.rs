// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use candor_store::{
    Answer, Difficulty, Feedback, Question, QuestionType, SessionConfig, SummaryData,
};

/// One generated interview question, before it gets a number and an id.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuestion {
    pub question_type: QuestionType,
    pub text: String,
    /// difficulty, hintAvailable, plus type-specific fields (options,
    /// fillSlots, tests, functionName, …).
    pub metadata: serde_json::Value,
}

/// Question/answer pair handed to the summarizer.
#[derive(Debug, Clone)]
pub struct QaItem {
    pub number: u32,
    pub question_type: QuestionType,
    pub text: String,
    pub metadata: serde_json::Value,
}

impl QaItem {
    pub fn from_question(q: &Question) -> Self {
        Self {
            number: q.number,
            question_type: q.question_type,
            text: q.text.clone(),
            metadata: q.metadata.clone(),
        }
    }
}

/// Capability set every provider implements.
///
/// Implementations may fail freely — the proxy catches every error and
/// substitutes the deterministic producers, so drivers stay simple.
#[async_trait]
pub trait InterviewProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &str;

    /// Produce the next question for a session.
    async fn generate_question(
        &self,
        config: &SessionConfig,
        remaining: u32,
        difficulty: Difficulty,
    ) -> anyhow::Result<GeneratedQuestion>;

    /// Score one answer against its question.
    async fn analyze_qa(
        &self,
        question: &Question,
        answer: Option<&Answer>,
    ) -> anyhow::Result<Feedback>;

    /// Produce the whole-session summary from the asked questions.
    async fn summarize(
        &self,
        config: &SessionConfig,
        qa: &[QaItem],
    ) -> anyhow::Result<SummaryData>;
}
