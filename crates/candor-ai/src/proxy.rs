// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use candor_config::AiConfig;
use candor_store::{Answer, Difficulty, Feedback, Question, SessionConfig, SummaryData};

use crate::fallback::{fallback_feedback, fallback_question, fallback_summary};
use crate::provider::{GeneratedQuestion, InterviewProvider, QaItem};
use crate::{GeminiProvider, OpenAiProvider};

/// Provider front door.  Every call is bounded by the provider timeout and
/// degrades to the deterministic producers on error — these methods cannot
/// fail and never block a session on a slow model.
pub struct AiProxy {
    provider: Option<Arc<dyn InterviewProvider>>,
    timeout: Duration,
}

impl AiProxy {
    /// Select a provider from configuration.  Without an API key in the
    /// configured environment variable the proxy runs fallback-only, which
    /// is also the sensible development default.
    pub fn from_config(config: &AiConfig) -> Self {
        match config.provider.as_str() {
            "openai" => match std::env::var(&config.openai_api_key_env) {
                Ok(key) if !key.is_empty() => Self::with_provider(
                    Arc::new(OpenAiProvider::new(key, config.openai_model.clone())),
                    Duration::from_secs(config.openai_timeout_secs),
                ),
                _ => {
                    warn!(provider = "openai", "no API key configured; using deterministic fallback");
                    Self::fallback_only()
                }
            },
            "gemini" => match std::env::var(&config.google_api_key_env) {
                Ok(key) if !key.is_empty() => Self::with_provider(
                    Arc::new(GeminiProvider::new(key, config.gemini_model.clone())),
                    Duration::from_secs(config.gemini_timeout_secs),
                ),
                _ => {
                    warn!(provider = "gemini", "no API key configured; using deterministic fallback");
                    Self::fallback_only()
                }
            },
            other => {
                warn!(provider = other, "unknown AI provider; using deterministic fallback");
                Self::fallback_only()
            }
        }
    }

    pub fn with_provider(provider: Arc<dyn InterviewProvider>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    pub fn fallback_only() -> Self {
        Self {
            provider: None,
            timeout: Duration::from_secs(0),
        }
    }

    pub async fn generate_question(
        &self,
        config: &SessionConfig,
        remaining: u32,
        difficulty: Difficulty,
    ) -> GeneratedQuestion {
        if let Some(provider) = &self.provider {
            match tokio::time::timeout(
                self.timeout,
                provider.generate_question(config, remaining, difficulty),
            )
            .await
            {
                Ok(Ok(q)) => return q,
                Ok(Err(e)) => warn!(provider = provider.name(), "question generation failed: {e:#}"),
                Err(_) => warn!(provider = provider.name(), "question generation timed out"),
            }
        }
        fallback_question(config, remaining, difficulty)
    }

    pub async fn analyze(&self, question: &Question, answer: Option<&Answer>) -> Feedback {
        if let Some(provider) = &self.provider {
            match tokio::time::timeout(self.timeout, provider.analyze_qa(question, answer)).await
            {
                Ok(Ok(f)) => return f,
                Ok(Err(e)) => warn!(provider = provider.name(), "analysis failed: {e:#}"),
                Err(_) => warn!(provider = provider.name(), "analysis timed out"),
            }
        }
        fallback_feedback(question, answer)
    }

    pub async fn summarize(&self, config: &SessionConfig, qa: &[QaItem]) -> SummaryData {
        if let Some(provider) = &self.provider {
            match tokio::time::timeout(self.timeout, provider.summarize(config, qa)).await {
                Ok(Ok(s)) => return s,
                Ok(Err(e)) => warn!(provider = provider.name(), "summarization failed: {e:#}"),
                Err(_) => warn!(provider = provider.name(), "summarization timed out"),
            }
        }
        fallback_summary()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FailingProvider, ScriptedProvider};
    use candor_store::QuestionType;
    use chrono::Utc;

    fn config(modes: &[&str]) -> SessionConfig {
        SessionConfig {
            role_category: "SRE".into(),
            role_sub_type: None,
            experience_years: 2,
            experience_months: 0,
            modes: modes.iter().map(|m| m.to_string()).collect(),
            question_count: 3,
            duration_limit: 30,
            language: "en".into(),
            accent_preference: None,
            difficulty: Difficulty::Medium,
            job_description: None,
            resume_file_ref: None,
            company_targets: vec![],
            include_curated_questions: true,
            allow_ai_generated: true,
            enable_mcq: None,
            enable_fib: None,
            consent_recording: true,
            consent_anti_cheat: true,
            consent_timestamp: "t".into(),
        }
    }

    fn question() -> Question {
        Question {
            id: "q1".into(),
            session_id: "s1".into(),
            number: 1,
            question_type: QuestionType::Behavioral,
            text: "Tell me".into(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn scripted_provider_output_is_used() {
        let provider = ScriptedProvider::new().push_question(GeneratedQuestion {
            question_type: QuestionType::Scenario,
            text: "scripted question".into(),
            metadata: serde_json::json!({"difficulty": "medium"}),
        });
        let proxy = AiProxy::with_provider(Arc::new(provider), Duration::from_secs(1));
        let q = proxy
            .generate_question(&config(&["behavioral"]), 3, Difficulty::Medium)
            .await;
        assert_eq!(q.text, "scripted question");
        assert_eq!(q.question_type, QuestionType::Scenario);
    }

    #[tokio::test]
    async fn failing_provider_degrades_to_fallback() {
        let proxy = AiProxy::with_provider(Arc::new(FailingProvider), Duration::from_secs(1));
        let q = proxy
            .generate_question(&config(&["coding"]), 3, Difficulty::Hard)
            .await;
        assert_eq!(q.question_type, QuestionType::Coding);
        assert!(q.metadata["tests"].is_array());

        let f = proxy.analyze(&question(), None).await;
        assert_eq!(f.score, 40);

        let s = proxy.summarize(&config(&["behavioral"]), &[]).await;
        assert_eq!(s.score_breakdown.overall, 75);
    }

    #[tokio::test]
    async fn fallback_only_never_touches_a_provider() {
        let proxy = AiProxy::fallback_only();
        let q = proxy
            .generate_question(&config(&["mcq"]), 1, Difficulty::Easy)
            .await;
        assert_eq!(q.question_type, QuestionType::Mcq);
    }

    #[tokio::test]
    async fn exhausted_scripts_fall_back_too() {
        let provider = ScriptedProvider::new(); // no scripts queued
        let proxy = AiProxy::with_provider(Arc::new(provider), Duration::from_secs(1));
        let f = proxy.analyze(&question(), None).await;
        assert_eq!(f.score, 40, "fallback heuristic for an absent answer");
    }
}
