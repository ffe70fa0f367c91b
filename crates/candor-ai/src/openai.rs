// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! OpenAI driver, speaking the Responses API.
//!
//! Prompting is deliberately plain text: the analysis call asks for a JSON
//! object and parses it defensively; the summary call keeps the raw model
//! text in `scoreBreakdown.raw` for audit while scoring conservatively.
//! Anything that goes wrong returns an error and the proxy falls back.

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use candor_store::{Answer, Difficulty, Feedback, Question, SessionConfig, SummaryData};

use crate::fallback::fallback_summary;
use crate::provider::{GeneratedQuestion, InterviewProvider, QaItem};

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";

pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    async fn complete(&self, input: String, json_output: bool) -> anyhow::Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": input,
        });
        if json_output {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }
        let resp = self
            .client
            .post(RESPONSES_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("openai request failed")?
            .error_for_status()
            .context("openai returned an error status")?;
        let value: serde_json::Value = resp.json().await.context("openai response not JSON")?;
        extract_output_text(&value).ok_or_else(|| anyhow!("openai response had no output text"))
    }
}

/// Pull the assistant text out of a Responses API payload.  Prefers the
/// convenience `output_text` field, falls back to walking `output[]`.
fn extract_output_text(value: &serde_json::Value) -> Option<String> {
    if let Some(text) = value.get("output_text").and_then(|t| t.as_str()) {
        return Some(text.trim().to_string());
    }
    let text = value
        .get("output")?
        .as_array()?
        .iter()
        .filter_map(|item| item.get("content")?.as_array())
        .flatten()
        .filter_map(|block| block.get("text")?.as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        None
    } else {
        Some(text.trim().to_string())
    }
}

/// Parse the analyzer's JSON reply, tolerating missing or mistyped keys.
fn parse_analysis(payload: &str) -> Feedback {
    let parsed: serde_json::Value = serde_json::from_str(payload).unwrap_or_default();
    Feedback {
        score: parsed
            .get("score")
            .and_then(|s| s.as_u64())
            .map(|s| s.min(100) as u32)
            .unwrap_or(75),
        feedback: parsed
            .get("feedback")
            .and_then(|f| f.as_str())
            .unwrap_or("Add more detail and structure.")
            .to_string(),
        model_answer: parsed
            .get("modelAnswer")
            .and_then(|m| m.as_str())
            .unwrap_or("Structure using STAR; include metrics and tradeoffs.")
            .to_string(),
    }
}

#[async_trait]
impl InterviewProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_question(
        &self,
        config: &SessionConfig,
        _remaining: u32,
        difficulty: Difficulty,
    ) -> anyhow::Result<GeneratedQuestion> {
        let mode = config
            .modes
            .first()
            .cloned()
            .unwrap_or_else(|| "behavioral".into());
        let prompt = format!(
            "You are an interviewer. Create one question in the given mode for a role.\n\
             Mode: {mode}\nRole: {role}\nDifficulty: {difficulty}\n\
             Return only the question text.",
            role = config.role_category,
            difficulty = difficulty.as_str(),
        );
        let text = self.complete(prompt, false).await?;
        Ok(GeneratedQuestion {
            question_type: serde_json::from_value(serde_json::Value::String(mode))
                .unwrap_or(candor_store::QuestionType::Behavioral),
            text,
            metadata: serde_json::json!({
                "difficulty": difficulty.as_str(),
                "hintAvailable": true,
            }),
        })
    }

    async fn analyze_qa(
        &self,
        question: &Question,
        answer: Option<&Answer>,
    ) -> anyhow::Result<Feedback> {
        let answer_text = answer
            .and_then(|a| a.response_text.as_deref())
            .unwrap_or("");
        let answer_type = answer.map(|a| a.answer_type.as_str()).unwrap_or("text");

        let mut parts = vec![
            "Evaluate the candidate's answer to the interview question.".to_string(),
            "Return a JSON object with keys: score (0-100), feedback (1-2 sentences), modelAnswer (short ideal outline).".to_string(),
            format!("Question type: {}", question.question_type.as_str()),
            format!("Answer type: {answer_type}"),
            format!("Question: {}", question.text),
            format!("Answer: {answer_text}"),
        ];
        if let Some(a) = answer {
            if let Some(selected) = &a.mcq_selected {
                parts.push(format!("Selected options: {selected:?}"));
                parts.push(
                    "Explain correctness and briefly note why alternatives are incorrect.".into(),
                );
            }
            if let Some(entries) = &a.fib_entries {
                parts.push(format!("Filled blanks: {entries:?}"));
                parts.push("Assess correctness per blank and provide ideal values.".into());
            }
        }
        let payload = self.complete(parts.join("\n"), true).await?;
        Ok(parse_analysis(&payload))
    }

    async fn summarize(
        &self,
        config: &SessionConfig,
        qa: &[QaItem],
    ) -> anyhow::Result<SummaryData> {
        let qa_lines = qa
            .iter()
            .map(|item| format!("Q{} ({}): {}", item.number, item.question_type.as_str(), item.text))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Summarize this interview session. Provide rubric (0-5) for communication, \
             problem_solving, technical, strengths (2-3 bullets), gaps (2-3 bullets), and \
             overall score (0-100).\nRole: {role}\nQuestions:\n{qa_lines}",
            role = config.role_category,
        );
        let text = self.complete(prompt, false).await?;
        // Conservative parse: keep the model text for audit, score neutrally.
        let mut summary = fallback_summary();
        summary.score_breakdown.raw = Some(text.chars().take(1000).collect());
        Ok(summary)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
