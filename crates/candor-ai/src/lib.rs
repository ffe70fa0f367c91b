// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! AI capability layer: question generation, per-answer analysis, and
//! session summarization.
//!
//! The engine depends only on [`AiProxy`], which wraps whichever
//! [`InterviewProvider`] the configuration selects with a per-provider
//! timeout and an unconditional deterministic fallback.  A degraded or
//! unconfigured provider therefore never blocks or fails a session — the
//! proxy's methods cannot error.

mod fallback;
mod gemini;
mod mock;
mod openai;
mod provider;
mod proxy;

pub use fallback::{fallback_feedback, fallback_question, fallback_summary};
pub use gemini::GeminiProvider;
pub use mock::{FailingProvider, ScriptedProvider};
pub use openai::OpenAiProvider;
pub use provider::{GeneratedQuestion, InterviewProvider, QaItem};
pub use proxy::AiProxy;
