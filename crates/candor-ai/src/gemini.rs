// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Google Gemini driver, speaking the `generateContent` REST API.

use anyhow::{anyhow, Context};
use async_trait::async_trait;

use candor_store::{Answer, Difficulty, Feedback, Question, SessionConfig, SummaryData};

use crate::fallback::fallback_summary;
use crate::provider::{GeneratedQuestion, InterviewProvider, QaItem};

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        }
    }

    async fn complete(&self, prompt: String) -> anyhow::Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("gemini request failed")?
            .error_for_status()
            .context("gemini returned an error status")?;
        let value: serde_json::Value = resp.json().await.context("gemini response not JSON")?;
        extract_candidate_text(&value)
            .ok_or_else(|| anyhow!("gemini response had no candidate text"))
    }
}

fn extract_candidate_text(value: &serde_json::Value) -> Option<String> {
    let text = value
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("text")?.as_str())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text.trim().to_string())
    }
}

#[async_trait]
impl InterviewProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
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
        let text = self.complete(prompt).await?;
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
        let prompt = format!(
            "Evaluate the candidate's answer to the interview question.\n\
             Return a JSON object with keys: score (0-100), feedback (1-2 sentences), \
             modelAnswer (short ideal outline).\n\
             Question type: {qtype}\nQuestion: {qtext}\nAnswer: {answer_text}",
            qtype = question.question_type.as_str(),
            qtext = question.text,
        );
        let payload = self.complete(prompt).await?;
        // Gemini wraps JSON in fences more often than not.
        let trimmed = payload
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        let parsed: serde_json::Value = serde_json::from_str(trimmed).unwrap_or_default();
        Ok(Feedback {
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
        })
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
        let text = self.complete(prompt).await?;
        let mut summary = fallback_summary();
        summary.score_breakdown.raw = Some(text.chars().take(1000).collect());
        Ok(summary)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_text_is_joined_from_parts() {
        let v = serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "one "}, {"text": "two"}]}
            }]
        });
        assert_eq!(extract_candidate_text(&v).as_deref(), Some("one two"));
    }

    #[test]
    fn missing_candidates_yield_none() {
        assert!(extract_candidate_text(&serde_json::json!({})).is_none());
        assert!(extract_candidate_text(&serde_json::json!({"candidates": []})).is_none());
    }
}
