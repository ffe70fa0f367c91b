// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! HTTP + WebSocket gateway.
//!
//! # Surface
//!
//! | Route | Credential |
//! |---|---|
//! | `POST /auth/login` | none (sets the `session` cookie) |
//! | `POST /interview/sessions` | user token |
//! | `POST /interview/{id}/precheck` | ACET |
//! | `POST /interview/{id}/start` | session cookie |
//! | `POST /interview/{id}/next-question` | AIPT |
//! | `POST /interview/{id}/answer`, `/code-eval`, `/finalize` | IST |
//! | `GET  /interview/{id}/state`, `/summary`, `/review` | user token |
//! | `POST /interview/{id}/anti-cheat` | ACET |
//! | `GET  /interview/{id}/anti-cheat/tail` | user token |
//! | `POST /interview/{id}/token/{refresh,acet,aipt}` | session cookie |
//! | `POST /media/issue-upt`, `POST /media/upload?token=UPT` | session cookie / UPT |
//! | `GET  /interview/{id}/stream?token=WST` | WST (close 4401/4403) |
//!
//! # Shape of a handler
//!
//! Authenticate → call the engine → commit happened inside → broadcast the
//! returned events → serialize the response.  Handlers never touch the
//! broadcast bus before the engine has committed, so listeners can never
//! observe an effect whose cause was rolled back.

pub mod broadcast;
pub mod error;
pub mod http;
pub mod state;

pub use broadcast::BroadcastBus;
pub use error::ApiError;
pub use http::serve;
pub use state::AppState;
