// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use candor_ai::{AiProxy, QaItem};
use candor_chain::{verify_batch, IncomingEvent};
use candor_config::{PolicyConfig, SandboxConfig};
use candor_sandbox::{CodeEvaluator, EvalReport, TestCase};
use candor_store::{
    new_id, Answer, AnswerType, ChainTail, ClaimOutcome, Feedback, PerQuestion, Question,
    Session, SessionConfig, SessionPatch, SessionState, Store, Strike, Summary, SummaryData,
};

use crate::error::EngineError;
use crate::events::Outbound;
use crate::fsm;

/// Minimum seconds between two questions of one session.
pub const QUESTION_GAP_SECS: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecheckStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrecheckOutcome {
    pub precheck_id: String,
    pub session_id: String,
    pub overall_status: PrecheckStatus,
    pub can_proceed: bool,
}

/// Wire shape of an answer submission.  `answer_type` is the discriminator;
/// fields belonging to a different variant reject the request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    #[serde(default)]
    pub session_id: Option<String>,
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
}

impl AnswerSubmission {
    /// Reject cross-variant payload fields.
    fn validate(&self) -> Result<(), EngineError> {
        let bad = match self.answer_type {
            AnswerType::Mcq => self.fib_entries.is_some() || self.code_ref.is_some(),
            AnswerType::Fib => self.mcq_selected.is_some() || self.code_ref.is_some(),
            AnswerType::Code => self.mcq_selected.is_some() || self.fib_entries.is_some(),
            AnswerType::Voice => {
                self.mcq_selected.is_some()
                    || self.fib_entries.is_some()
                    || self.code_ref.is_some()
            }
            AnswerType::Text => {
                self.mcq_selected.is_some()
                    || self.fib_entries.is_some()
                    || self.audio_ref.is_some()
            }
        };
        if bad {
            Err(EngineError::Validation("invalid_answer_payload"))
        } else {
            Ok(())
        }
    }
}

/// The session engine.  One instance serves every session; per-session
/// consistency comes from the store's CAS operations, not from locks here.
pub struct Engine {
    store: Arc<dyn Store>,
    ai: AiProxy,
    policy: PolicyConfig,
    evaluator: CodeEvaluator,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        ai: AiProxy,
        policy: PolicyConfig,
        sandbox: &SandboxConfig,
    ) -> Self {
        Self {
            store,
            ai,
            policy,
            evaluator: CodeEvaluator::new(sandbox),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    // ── Session lifecycle ─────────────────────────────────────────────────────

    /// Create a session in PendingPrecheck.  Both consents are mandatory.
    pub async fn create_session(
        &self,
        user_sub: &str,
        config: SessionConfig,
    ) -> Result<Session, EngineError> {
        if !config.consent_recording || !config.consent_anti_cheat {
            return Err(EngineError::ConsentRequired);
        }
        let session = Session::new(new_id(), user_sub.to_string(), config, Utc::now());
        self.store.insert_session(session.clone()).await?;
        info!(session = %session.id, user = user_sub, "session created");
        Ok(session)
    }

    /// Device precheck: persist any submitted events onto the chain, grade
    /// the checks, and move the session to Ready unless the grade is fail.
    pub async fn precheck(
        &self,
        session_id: &str,
        checks: serde_json::Value,
        events: Vec<IncomingEvent>,
    ) -> Result<PrecheckOutcome, EngineError> {
        let session = self.store.session(session_id).await?;
        if !fsm::PRECHECK_SOURCES.contains(&session.state) {
            return Err(EngineError::InvalidState);
        }

        if !events.is_empty() {
            let tail = self.store.event_tail(session_id).await?;
            let enriched = verify_batch(session_id, &tail, events, Utc::now())?;
            self.store
                .append_events(session_id, tail.seq, enriched)
                .await?;
        }

        let overall = grade_checks(&checks);
        if overall != PrecheckStatus::Fail {
            self.store
                .cas_state(
                    session_id,
                    fsm::PRECHECK_SOURCES,
                    SessionState::Ready,
                    SessionPatch::default().precheck(checks),
                )
                .await?;
        }

        Ok(PrecheckOutcome {
            precheck_id: new_id(),
            session_id: session_id.to_string(),
            overall_status: overall,
            can_proceed: overall != PrecheckStatus::Fail,
        })
    }

    /// Ready → Active.  Token issuance is the caller's business.
    pub async fn start(&self, session_id: &str) -> Result<Session, EngineError> {
        let session = self
            .store
            .cas_state(
                session_id,
                fsm::START_SOURCES,
                SessionState::Active,
                SessionPatch::default(),
            )
            .await?;
        info!(session = session_id, "interview started");
        Ok(session)
    }

    /// Current state snapshot for client resync.
    pub async fn state(&self, session_id: &str) -> Result<(SessionState, u32), EngineError> {
        let session = self.store.session(session_id).await?;
        Ok((session.state, session.asked_count))
    }

    pub async fn session(&self, session_id: &str) -> Result<Session, EngineError> {
        Ok(self.store.session(session_id).await?)
    }

    // ── Question orchestration ────────────────────────────────────────────────

    /// Mint the next question.  Preconditions (Active, nothing outstanding,
    /// quota, 5 s pacing) are re-checked atomically by the slot claim, so of
    /// two concurrent callers at most one succeeds.
    pub async fn next_question(
        &self,
        session_id: &str,
    ) -> Result<(Question, u32, Vec<Outbound>), EngineError> {
        let session = self.store.session(session_id).await?;
        precheck_claim(&session)?;

        let remaining = session.config.question_count - session.asked_count;
        let generated = self
            .ai
            .generate_question(&session.config, remaining, session.config.difficulty)
            .await;

        let claimed = match self
            .store
            .claim_question_slot(session_id, QUESTION_GAP_SECS, Utc::now())
            .await?
        {
            ClaimOutcome::Claimed(session) => session,
            ClaimOutcome::NotActive(_) => return Err(EngineError::InvalidState),
            ClaimOutcome::AwaitingAnswer => return Err(EngineError::AnswerRequired),
            ClaimOutcome::QuotaExhausted => return Err(EngineError::NoQuestionsRemaining),
            ClaimOutcome::Paced { .. } => return Err(EngineError::RateLimited),
        };

        let question = Question {
            id: new_id(),
            session_id: session_id.to_string(),
            number: claimed.asked_count,
            question_type: generated.question_type,
            text: generated.text,
            metadata: generated.metadata,
            created_at: Utc::now(),
        };
        self.store.insert_question(question.clone()).await?;

        let outbound = vec![Outbound::QuestionCreated {
            question_id: question.id.clone(),
            qtype: question.question_type.as_str().to_string(),
            number: question.number,
        }];
        Ok((question, claimed.config.question_count, outbound))
    }

    // ── Answer intake ─────────────────────────────────────────────────────────

    /// Persist an answer and clear the outstanding-question flag, then run
    /// the analyzer best-effort.  Analyzer trouble never fails the call; it
    /// just returns no feedback.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        submission: AnswerSubmission,
    ) -> Result<(Option<Feedback>, Vec<Outbound>), EngineError> {
        submission.validate()?;
        let session = self.store.session(session_id).await?;
        if session.state != SessionState::Active {
            return Err(EngineError::InvalidState);
        }

        let answer = Answer {
            id: new_id(),
            session_id: session_id.to_string(),
            question_id: submission.question_id.clone(),
            answer_type: submission.answer_type,
            response_text: submission.response_text,
            audio_ref: submission.audio_ref,
            code_ref: submission.code_ref,
            mcq_selected: submission.mcq_selected,
            fib_entries: submission.fib_entries,
            transcripts: submission.transcripts,
            time_spent: submission.time_spent,
            code_tests: submission.code_tests,
            immediate_feedback: None,
            created_at: Utc::now(),
        };
        self.store.insert_answer(answer.clone()).await?;
        self.store
            .update_session(session_id, SessionPatch::default().awaiting_answer(false))
            .await?;

        let mut outbound = Vec::new();
        let feedback = match self
            .store
            .question(session_id, &submission.question_id)
            .await
        {
            Ok(question) => {
                let feedback = self.ai.analyze(&question, Some(&answer)).await;
                if let Err(e) = self
                    .store
                    .set_answer_feedback(session_id, &answer.id, feedback.clone())
                    .await
                {
                    warn!(session = session_id, "could not persist feedback: {e}");
                }
                outbound.push(Outbound::FeedbackCreated {
                    question_id: submission.question_id.clone(),
                    feedback: feedback.clone(),
                });
                Some(feedback)
            }
            Err(e) => {
                warn!(session = session_id, question = %submission.question_id, "skipping analysis: {e}");
                None
            }
        };

        Ok((feedback, outbound))
    }

    // ── Code evaluation ───────────────────────────────────────────────────────

    pub async fn code_eval(
        &self,
        code: &str,
        function_name: &str,
        tests: &[TestCase],
    ) -> Result<EvalReport, EngineError> {
        Ok(self.evaluator.evaluate(code, function_name, tests).await?)
    }

    // ── Anti-cheat ingest ─────────────────────────────────────────────────────

    pub async fn chain_tail(&self, session_id: &str) -> Result<ChainTail, EngineError> {
        self.store.session(session_id).await?;
        Ok(self.store.event_tail(session_id).await?)
    }

    /// Ingest a batch of chained events, classify strikes, and apply the
    /// policy verdict (pause / seal / tab escalation).
    pub async fn ingest_events(
        &self,
        session_id: &str,
        events: Vec<IncomingEvent>,
    ) -> Result<(ChainTail, Vec<Outbound>), EngineError> {
        let session = self.store.session(session_id).await?;
        if session.state.is_terminal() {
            return Err(EngineError::InvalidState);
        }
        if events.is_empty() {
            return Ok((self.store.event_tail(session_id).await?, Vec::new()));
        }

        let tail = self.store.event_tail(session_id).await?;
        let now = Utc::now();
        let enriched = verify_batch(session_id, &tail, events, now)?;
        let new_tail = self
            .store
            .append_events(session_id, tail.seq, enriched.clone())
            .await?;

        let drafts: Vec<_> = enriched
            .iter()
            .filter_map(|ev| candor_policy::classify(&self.policy, ev))
            .collect();
        if drafts.is_empty() {
            return Ok((new_tail, Vec::new()));
        }

        let mut strikes: Vec<Strike> = drafts
            .iter()
            .map(|d| Strike {
                id: new_id(),
                session_id: session_id.to_string(),
                strike_type: d.strike_type.clone(),
                severity: d.severity,
                ts: d.ts.clone(),
                details: d.details.clone(),
                created_at: now,
            })
            .collect();

        let deltas = candor_policy::counter_deltas(&drafts);
        let updated = self.store.inc_policy_counters(session_id, &deltas).await?;
        let after = updated.policy_counters.clone();
        let before = counters_before(&after, &deltas);

        let verdict =
            candor_policy::evaluate(&self.policy, updated.state, &before, &after, &drafts);

        if verdict.tab_escalation {
            let last_tab = drafts
                .iter()
                .rev()
                .find(|d| d.strike_type == candor_policy::TAB_SWITCH);
            strikes.push(Strike {
                id: new_id(),
                session_id: session_id.to_string(),
                strike_type: candor_policy::TAB_SWITCH.to_string(),
                severity: candor_store::Severity::Red,
                ts: last_tab.map(|d| d.ts.clone()).unwrap_or_default(),
                details: serde_json::json!({
                    "escalated": true,
                    "count": after.get(candor_policy::TAB_SWITCH).copied().unwrap_or(0),
                }),
                created_at: now,
            });
        }

        self.store.insert_strikes(strikes.clone()).await?;
        let mut outbound: Vec<Outbound> = strikes.iter().map(Outbound::strike).collect();

        if let Some(end_code) = verdict.end_code {
            outbound.extend(self.seal(session_id, end_code).await?);
        } else if let Some(reason) = verdict.pause_reason {
            match self
                .store
                .cas_state(
                    session_id,
                    fsm::PAUSE_SOURCES,
                    SessionState::Paused,
                    SessionPatch::default().pause_reason(reason),
                )
                .await
            {
                Ok(_) => {
                    info!(session = session_id, reason, "session auto-paused");
                    outbound.push(Outbound::SessionPaused {
                        reason: reason.to_string(),
                    });
                }
                // Already paused or sealed by a concurrent batch.
                Err(candor_store::StoreError::Conflict(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        Ok((new_tail, outbound))
    }

    // ── Finalization ──────────────────────────────────────────────────────────

    /// Candidate-requested finalization: build the summary and complete.
    pub async fn finalize(&self, session_id: &str) -> Result<Summary, EngineError> {
        let session = self.store.session(session_id).await?;
        if session.state != SessionState::Active {
            return Err(EngineError::InvalidState);
        }

        let summary = self.build_summary(&session).await?;
        self.store.insert_summary(summary.clone()).await?;
        self.store
            .cas_state(
                session_id,
                fsm::FINALIZE_SOURCES,
                SessionState::Completed,
                SessionPatch::default().sealed_at(Utc::now()),
            )
            .await?;
        info!(session = session_id, summary = %summary.id, "session finalized");
        Ok(summary)
    }

    /// Policy-driven seal: summary, Ended, `SESSION_ENDED`.
    async fn seal(&self, session_id: &str, end_code: &'static str) -> Result<Vec<Outbound>, EngineError> {
        let session = self.store.session(session_id).await?;
        let summary = self.build_summary(&session).await?;
        match self.store.insert_summary(summary).await {
            Ok(()) => {}
            // A concurrent seal already wrote the summary; keep its copy.
            Err(candor_store::StoreError::AlreadyExists) => {}
            Err(e) => return Err(e.into()),
        }
        match self
            .store
            .cas_state(
                session_id,
                fsm::SEAL_SOURCES,
                SessionState::Ended,
                SessionPatch::default()
                    .end_code(end_code)
                    .sealed_at(Utc::now()),
            )
            .await
        {
            Ok(_) => {
                info!(session = session_id, end_code, "session auto-sealed");
                Ok(vec![Outbound::SessionEnded {
                    reason: end_code.to_string(),
                }])
            }
            // A concurrent batch sealed first; its SESSION_ENDED stands.
            Err(candor_store::StoreError::Conflict(_)) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Per-question analysis over the latest answers plus the whole-session
    /// summary.  Provider degradation is already absorbed by the proxy.
    async fn build_summary(&self, session: &Session) -> Result<Summary, EngineError> {
        let questions = self.store.questions(&session.id).await?;
        let answers = self.store.answers(&session.id).await?;

        // answers() is ordered by creation time, so the map ends up holding
        // the latest answer per question.
        let mut latest: HashMap<&str, &Answer> = HashMap::new();
        for answer in &answers {
            latest.insert(answer.question_id.as_str(), answer);
        }

        let mut per_question = Vec::with_capacity(questions.len());
        let mut qa = Vec::with_capacity(questions.len());
        for question in &questions {
            qa.push(QaItem::from_question(question));
            let feedback = self
                .ai
                .analyze(question, latest.get(question.id.as_str()).copied())
                .await;
            per_question.push(PerQuestion {
                question_id: question.id.clone(),
                number: question.number,
                score: feedback.score,
                feedback: feedback.feedback,
                model_answer: feedback.model_answer,
            });
        }

        let data: SummaryData = self.ai.summarize(&session.config, &qa).await;
        Ok(Summary {
            id: new_id(),
            session_id: session.id.clone(),
            summary: data,
            per_question,
            created_at: Utc::now(),
        })
    }

    // ── Read models ───────────────────────────────────────────────────────────

    pub async fn summary(&self, session_id: &str) -> Result<Summary, EngineError> {
        self.store.session(session_id).await?;
        Ok(self.store.summary(session_id).await?)
    }

    /// Question-by-question review: question fields, the full answer list,
    /// the latest answer payload, and scores merged from the summary.
    pub async fn review(&self, session_id: &str) -> Result<serde_json::Value, EngineError> {
        self.store.session(session_id).await?;
        let questions = self.store.questions(session_id).await?;
        let answers = self.store.answers(session_id).await?;
        let per_question: HashMap<String, PerQuestion> = match self.store.summary(session_id).await
        {
            Ok(summary) => summary
                .per_question
                .into_iter()
                .map(|p| (p.question_id.clone(), p))
                .collect(),
            Err(_) => HashMap::new(),
        };

        let mut items = Vec::with_capacity(questions.len());
        for question in &questions {
            let mine: Vec<&Answer> = answers
                .iter()
                .filter(|a| a.question_id == question.id)
                .collect();
            let latest = mine.last();
            let merged = per_question.get(&question.id);
            items.push(serde_json::json!({
                "questionId": question.id,
                "number": question.number,
                "type": question.question_type.as_str(),
                "text": question.text,
                "metadata": question.metadata,
                "yourAnswer": latest.and_then(|a| a.response_text.clone()),
                "answerType": latest.map(|a| a.answer_type),
                "mcqSelected": latest.and_then(|a| a.mcq_selected.clone()),
                "fibEntries": latest.and_then(|a| a.fib_entries.clone()),
                "codeTests": latest.and_then(|a| a.code_tests.clone()),
                "answers": mine.iter().map(|a| serde_json::json!({
                    "id": a.id,
                    "answerType": a.answer_type,
                    "responseText": a.response_text,
                    "createdAt": a.created_at,
                })).collect::<Vec<_>>(),
                "score": merged.map(|p| p.score),
                "feedback": merged.map(|p| p.feedback.clone()),
                "modelAnswer": merged.map(|p| p.model_answer.clone()),
            }));
        }
        Ok(serde_json::json!({ "items": items }))
    }
}

/// `warning` iff `checks.network.status == "warning"`, else `pass`.  No
/// current check produces `fail`; the FSM guard still handles it.
fn grade_checks(checks: &serde_json::Value) -> PrecheckStatus {
    match checks
        .get("network")
        .and_then(|n| n.get("status"))
        .and_then(|s| s.as_str())
    {
        Some("warning") => PrecheckStatus::Warning,
        _ => PrecheckStatus::Pass,
    }
}

/// Quota/state/pacing snapshot check so callers get the precise error
/// before the authoritative CAS claim runs.
fn precheck_claim(session: &Session) -> Result<(), EngineError> {
    if session.state != SessionState::Active {
        return Err(EngineError::InvalidState);
    }
    if session.awaiting_answer {
        return Err(EngineError::AnswerRequired);
    }
    if session.asked_count >= session.config.question_count {
        return Err(EngineError::NoQuestionsRemaining);
    }
    if let Some(last) = session.last_asked_at {
        if (Utc::now() - last).num_seconds() < QUESTION_GAP_SECS {
            return Err(EngineError::RateLimited);
        }
    }
    Ok(())
}

fn counters_before(
    after: &HashMap<String, u32>,
    deltas: &[(String, u32)],
) -> HashMap<String, u32> {
    let mut before = after.clone();
    for (key, delta) in deltas {
        if let Some(v) = before.get_mut(key) {
            *v = v.saturating_sub(*delta);
        }
    }
    before
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
