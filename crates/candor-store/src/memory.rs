// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::records::{
    Answer, ChainTail, ChainedEvent, Feedback, Question, Session, SessionState, Strike, Summary,
};
use crate::store::{ClaimOutcome, SessionPatch, Store, StoreError};

/// In-process store.  One mutex guards all collections, which is what makes
/// the cross-record operations (event append, question claim) transactional.
/// The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    /// session id → questions ordered by number.
    questions: HashMap<String, Vec<Question>>,
    /// session id → answers in insertion (creation) order.
    answers: HashMap<String, Vec<Answer>>,
    /// session id → events ordered by seq.
    events: HashMap<String, Vec<ChainedEvent>>,
    strikes: HashMap<String, Vec<Strike>>,
    /// session id → the one summary.
    summaries: HashMap<String, Summary>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory store poisoned")
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_session(&self, session: Session) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.sessions.contains_key(&session.id) {
            return Err(StoreError::AlreadyExists);
        }
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn session(&self, id: &str) -> Result<Session, StoreError> {
        self.lock()
            .sessions
            .get(id)
            .cloned()
            .ok_or(StoreError::SessionNotFound)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session, StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound)?;
        patch.apply(session);
        Ok(session.clone())
    }

    async fn cas_state(
        &self,
        id: &str,
        from: &[SessionState],
        to: SessionState,
        patch: SessionPatch,
    ) -> Result<Session, StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound)?;
        if !from.contains(&session.state) {
            return Err(StoreError::Conflict("state"));
        }
        session.state = to;
        patch.apply(session);
        Ok(session.clone())
    }

    async fn claim_question_slot(
        &self,
        id: &str,
        min_gap_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound)?;
        if session.state != SessionState::Active {
            return Ok(ClaimOutcome::NotActive(session.state));
        }
        if session.awaiting_answer {
            return Ok(ClaimOutcome::AwaitingAnswer);
        }
        if session.asked_count >= session.config.question_count {
            return Ok(ClaimOutcome::QuotaExhausted);
        }
        if let Some(last) = session.last_asked_at {
            let since = (now - last).num_seconds();
            if since < min_gap_secs {
                return Ok(ClaimOutcome::Paced {
                    since_last_secs: since,
                });
            }
        }
        session.asked_count += 1;
        session.awaiting_answer = true;
        session.last_asked_at = Some(now);
        Ok(ClaimOutcome::Claimed(session.clone()))
    }

    async fn inc_policy_counters(
        &self,
        id: &str,
        deltas: &[(String, u32)],
    ) -> Result<Session, StoreError> {
        let mut inner = self.lock();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or(StoreError::SessionNotFound)?;
        for (event_type, delta) in deltas {
            *session
                .policy_counters
                .entry(event_type.clone())
                .or_insert(0) += delta;
        }
        Ok(session.clone())
    }

    async fn insert_question(&self, question: Question) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let list = inner
            .questions
            .entry(question.session_id.clone())
            .or_default();
        if list.iter().any(|q| q.number == question.number) {
            return Err(StoreError::AlreadyExists);
        }
        list.push(question);
        list.sort_by_key(|q| q.number);
        Ok(())
    }

    async fn questions(&self, session_id: &str) -> Result<Vec<Question>, StoreError> {
        Ok(self
            .lock()
            .questions
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn question(
        &self,
        session_id: &str,
        question_id: &str,
    ) -> Result<Question, StoreError> {
        self.lock()
            .questions
            .get(session_id)
            .and_then(|list| list.iter().find(|q| q.id == question_id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_answer(&self, answer: Answer) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .answers
            .entry(answer.session_id.clone())
            .or_default()
            .push(answer);
        Ok(())
    }

    async fn answers(&self, session_id: &str) -> Result<Vec<Answer>, StoreError> {
        let mut list = self
            .lock()
            .answers
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        list.sort_by_key(|a| a.created_at);
        Ok(list)
    }

    async fn set_answer_feedback(
        &self,
        session_id: &str,
        answer_id: &str,
        feedback: Feedback,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let answer = inner
            .answers
            .get_mut(session_id)
            .and_then(|list| list.iter_mut().find(|a| a.id == answer_id))
            .ok_or(StoreError::NotFound)?;
        answer.immediate_feedback = Some(feedback);
        Ok(())
    }

    async fn event_tail(&self, session_id: &str) -> Result<ChainTail, StoreError> {
        Ok(self
            .lock()
            .events
            .get(session_id)
            .and_then(|list| list.last())
            .map(|e| ChainTail {
                seq: e.seq,
                hash: e.hash.clone(),
            })
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        session_id: &str,
        expected_tail_seq: u64,
        events: Vec<ChainedEvent>,
    ) -> Result<ChainTail, StoreError> {
        let mut inner = self.lock();
        let list = inner.events.entry(session_id.to_string()).or_default();
        let current_tail = list.last().map(|e| e.seq).unwrap_or(0);
        if current_tail != expected_tail_seq {
            return Err(StoreError::TailMoved);
        }
        list.extend(events);
        let tail = list.last().map(|e| ChainTail {
            seq: e.seq,
            hash: e.hash.clone(),
        });
        Ok(tail.unwrap_or_default())
    }

    async fn events(&self, session_id: &str) -> Result<Vec<ChainedEvent>, StoreError> {
        Ok(self
            .lock()
            .events
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_strikes(&self, strikes: Vec<Strike>) -> Result<(), StoreError> {
        let mut inner = self.lock();
        for strike in strikes {
            inner
                .strikes
                .entry(strike.session_id.clone())
                .or_default()
                .push(strike);
        }
        Ok(())
    }

    async fn strikes(&self, session_id: &str) -> Result<Vec<Strike>, StoreError> {
        Ok(self
            .lock()
            .strikes
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_summary(&self, summary: Summary) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.summaries.contains_key(&summary.session_id) {
            return Err(StoreError::AlreadyExists);
        }
        inner
            .summaries
            .insert(summary.session_id.clone(), summary);
        Ok(())
    }

    async fn summary(&self, session_id: &str) -> Result<Summary, StoreError> {
        self.lock()
            .summaries
            .get(session_id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{Difficulty, QuestionType, SessionConfig};
    use crate::new_id;

    fn config(question_count: u32) -> SessionConfig {
        SessionConfig {
            role_category: "Backend Engineer".into(),
            role_sub_type: None,
            experience_years: 3,
            experience_months: 0,
            modes: vec!["behavioral".into()],
            question_count,
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
            consent_timestamp: "2026-01-01T00:00:00Z".into(),
        }
    }

    async fn seeded(state: SessionState, question_count: u32) -> (MemoryStore, String) {
        let store = MemoryStore::new();
        let id = new_id();
        let mut session = Session::new(id.clone(), "u@example.com".into(), config(question_count), Utc::now());
        session.state = state;
        store.insert_session(session).await.unwrap();
        (store, id)
    }

    fn event(session_id: &str, seq: u64, hash: &str) -> ChainedEvent {
        ChainedEvent {
            id: new_id(),
            session_id: session_id.into(),
            seq,
            event_type: "TAB_SWITCH".into(),
            details: serde_json::json!({}),
            ts: "T".into(),
            prev_hash: String::new(),
            hash: hash.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_fetch_session() {
        let (store, id) = seeded(SessionState::PendingPrecheck, 3).await;
        let s = store.session(&id).await.unwrap();
        assert_eq!(s.asked_count, 0);
        assert!(matches!(
            store.session("missing").await,
            Err(StoreError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_session_insert_fails() {
        let (store, id) = seeded(SessionState::Ready, 1).await;
        let dup = store.session(&id).await.unwrap();
        assert_eq!(
            store.insert_session(dup).await,
            Err(StoreError::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn cas_state_enforces_precondition() {
        let (store, id) = seeded(SessionState::Ready, 1).await;
        let s = store
            .cas_state(&id, &[SessionState::Ready], SessionState::Active, SessionPatch::default())
            .await
            .unwrap();
        assert_eq!(s.state, SessionState::Active);
        // Second transition from Ready must now fail.
        assert!(matches!(
            store
                .cas_state(&id, &[SessionState::Ready], SessionState::Active, SessionPatch::default())
                .await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn claim_increments_and_blocks_until_answer() {
        let (store, id) = seeded(SessionState::Active, 2).await;
        let now = Utc::now();
        let outcome = store.claim_question_slot(&id, 5, now).await.unwrap();
        let session = match outcome {
            ClaimOutcome::Claimed(s) => s,
            other => panic!("expected claim, got {other:?}"),
        };
        assert_eq!(session.asked_count, 1);
        assert!(session.awaiting_answer);

        // Second claim is blocked by the outstanding answer, not by pacing.
        let outcome = store.claim_question_slot(&id, 5, now).await.unwrap();
        assert!(matches!(outcome, ClaimOutcome::AwaitingAnswer));
    }

    #[tokio::test]
    async fn claim_enforces_pacing_and_quota() {
        let (store, id) = seeded(SessionState::Active, 2).await;
        let t0 = Utc::now();
        assert!(matches!(
            store.claim_question_slot(&id, 5, t0).await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
        store
            .update_session(&id, SessionPatch::default().awaiting_answer(false))
            .await
            .unwrap();

        // Within the 5 s window → paced.
        let t1 = t0 + chrono::Duration::seconds(2);
        assert!(matches!(
            store.claim_question_slot(&id, 5, t1).await.unwrap(),
            ClaimOutcome::Paced { .. }
        ));

        // After the window → claimed; quota is then exhausted.
        let t2 = t0 + chrono::Duration::seconds(6);
        assert!(matches!(
            store.claim_question_slot(&id, 5, t2).await.unwrap(),
            ClaimOutcome::Claimed(_)
        ));
        store
            .update_session(&id, SessionPatch::default().awaiting_answer(false))
            .await
            .unwrap();
        let t3 = t0 + chrono::Duration::seconds(20);
        assert!(matches!(
            store.claim_question_slot(&id, 5, t3).await.unwrap(),
            ClaimOutcome::QuotaExhausted
        ));
    }

    #[tokio::test]
    async fn question_numbers_are_unique_per_session() {
        let (store, id) = seeded(SessionState::Active, 3).await;
        let q = Question {
            id: new_id(),
            session_id: id.clone(),
            number: 1,
            question_type: QuestionType::Behavioral,
            text: "q".into(),
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        };
        store.insert_question(q.clone()).await.unwrap();
        let dup = Question {
            id: new_id(),
            ..q
        };
        assert_eq!(
            store.insert_question(dup).await,
            Err(StoreError::AlreadyExists)
        );
    }

    #[tokio::test]
    async fn append_events_fails_when_tail_moved() {
        let (store, id) = seeded(SessionState::Active, 1).await;
        assert_eq!(store.event_tail(&id).await.unwrap(), ChainTail::default());

        let tail = store
            .append_events(&id, 0, vec![event(&id, 1, "h1")])
            .await
            .unwrap();
        assert_eq!(tail.seq, 1);
        assert_eq!(tail.hash, "h1");

        // A batch verified against the old tail must not append.
        assert_eq!(
            store.append_events(&id, 0, vec![event(&id, 2, "h2")]).await,
            Err(StoreError::TailMoved)
        );
        assert_eq!(store.events(&id).await.unwrap().len(), 1);

        // With the fresh tail it goes through.
        let tail = store
            .append_events(&id, 1, vec![event(&id, 5, "h5")])
            .await
            .unwrap();
        assert_eq!(tail.seq, 5);
    }

    #[tokio::test]
    async fn policy_counters_accumulate() {
        let (store, id) = seeded(SessionState::Active, 1).await;
        let s = store
            .inc_policy_counters(&id, &[("FS_EXIT".into(), 1)])
            .await
            .unwrap();
        assert_eq!(s.counter("FS_EXIT"), 1);
        let s = store
            .inc_policy_counters(&id, &[("FS_EXIT".into(), 2), ("TAB_SWITCH".into(), 1)])
            .await
            .unwrap();
        assert_eq!(s.counter("FS_EXIT"), 3);
        assert_eq!(s.counter("TAB_SWITCH"), 1);
    }

    #[tokio::test]
    async fn one_summary_per_session() {
        let (store, id) = seeded(SessionState::Active, 1).await;
        let summary = Summary {
            id: new_id(),
            session_id: id.clone(),
            summary: crate::records::SummaryData {
                rubric: crate::records::Rubric {
                    communication: 3,
                    problem_solving: 3,
                    technical: 3,
                },
                strengths: vec![],
                gaps: vec![],
                score_breakdown: crate::records::ScoreBreakdown {
                    overall: 75,
                    raw: None,
                },
            },
            per_question: vec![],
            created_at: Utc::now(),
        };
        store.insert_summary(summary.clone()).await.unwrap();
        assert_eq!(
            store.insert_summary(summary).await,
            Err(StoreError::AlreadyExists)
        );
        assert!(store.summary(&id).await.is_ok());
    }
}
