// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use candor_store::{Answer, Difficulty, Feedback, Question, SessionConfig, SummaryData};

use crate::provider::{GeneratedQuestion, InterviewProvider, QaItem};

/// Pre-scripted provider for tests.  Each capability pops from its own
/// queue; an exhausted queue errors, which exercises the proxy fallback
/// path without network access.
#[derive(Default)]
pub struct ScriptedProvider {
    questions: Mutex<Vec<GeneratedQuestion>>,
    analyses: Mutex<Vec<Feedback>>,
    summaries: Mutex<Vec<SummaryData>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_question(self, q: GeneratedQuestion) -> Self {
        self.questions.lock().unwrap().push(q);
        self
    }

    pub fn push_analysis(self, f: Feedback) -> Self {
        self.analyses.lock().unwrap().push(f);
        self
    }

    pub fn push_summary(self, s: SummaryData) -> Self {
        self.summaries.lock().unwrap().push(s);
        self
    }
}

#[async_trait]
impl InterviewProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_question(
        &self,
        _config: &SessionConfig,
        _remaining: u32,
        _difficulty: Difficulty,
    ) -> anyhow::Result<GeneratedQuestion> {
        let mut q = self.questions.lock().unwrap();
        if q.is_empty() {
            Err(anyhow!("no scripted question"))
        } else {
            Ok(q.remove(0))
        }
    }

    async fn analyze_qa(
        &self,
        _question: &Question,
        _answer: Option<&Answer>,
    ) -> anyhow::Result<Feedback> {
        let mut a = self.analyses.lock().unwrap();
        if a.is_empty() {
            Err(anyhow!("no scripted analysis"))
        } else {
            Ok(a.remove(0))
        }
    }

    async fn summarize(
        &self,
        _config: &SessionConfig,
        _qa: &[QaItem],
    ) -> anyhow::Result<SummaryData> {
        let mut s = self.summaries.lock().unwrap();
        if s.is_empty() {
            Err(anyhow!("no scripted summary"))
        } else {
            Ok(s.remove(0))
        }
    }
}

/// Provider whose every call fails.  Used to prove the proxy degrades to
/// the deterministic producers.
#[derive(Default)]
pub struct FailingProvider;

#[async_trait]
impl InterviewProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate_question(
        &self,
        _config: &SessionConfig,
        _remaining: u32,
        _difficulty: Difficulty,
    ) -> anyhow::Result<GeneratedQuestion> {
        Err(anyhow!("provider down"))
    }

    async fn analyze_qa(
        &self,
        _question: &Question,
        _answer: Option<&Answer>,
    ) -> anyhow::Result<Feedback> {
        Err(anyhow!("provider down"))
    }

    async fn summarize(
        &self,
        _config: &SessionConfig,
        _qa: &[QaItem],
    ) -> anyhow::Result<SummaryData> {
        Err(anyhow!("provider down"))
    }
}
