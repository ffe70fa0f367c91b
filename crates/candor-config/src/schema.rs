// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `false`, so fields
/// that should be enabled unless explicitly disabled need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub tokens: TokenTtls,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    pub bind: String,
    /// Origins allowed by the CORS layer.  The browser client must be listed
    /// here or WebSocket upgrades and cookie requests will be rejected.
    pub allowed_origins: Vec<String>,
    /// Maximum accepted request body size in megabytes (media uploads).
    pub max_request_mb: usize,
    /// Directory where uploaded media blobs are written.
    pub upload_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8480".into(),
            allowed_origins: vec!["http://localhost:3000".into()],
            max_request_mb: 50,
            upload_dir: ".uploads".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Connection URI of the backing document store.  The in-process store
    /// ignores this; it exists so deployments can swap the implementation
    /// without a schema change.
    pub uri: String,
    pub db_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "memory://".into(),
            db_name: "candor".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret for all minted tokens.  When empty a random
    /// secret is generated at startup, which invalidates tokens across
    /// restarts — fine for development, set it for anything real.
    #[serde(default)]
    pub signing_secret: String,
    /// Environment variable consulted when `signing_secret` is empty.
    pub signing_secret_env: String,
    /// Send the session cookie with the `Secure` attribute.
    #[serde(default)]
    pub cookie_secure: bool,
    /// Optional cookie `Domain` attribute.
    #[serde(default)]
    pub cookie_domain: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            signing_secret_env: "CANDOR_SIGNING_SECRET".into(),
            cookie_secure: false,
            cookie_domain: None,
        }
    }
}

/// Token lifetimes in seconds, one per audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenTtls {
    pub user: u64,
    pub ist: u64,
    pub wst: u64,
    pub aipt: u64,
    pub upt: u64,
    pub acet: u64,
}

impl Default for TokenTtls {
    fn default() -> Self {
        Self {
            user: 3600,
            ist: 900,
            wst: 900,
            aipt: 600,
            upt: 1200,
            acet: 900,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider identifier: "openai" | "gemini" | "scripted" (tests).
    pub provider: String,
    /// Environment variable that holds the OpenAI API key (read at runtime).
    pub openai_api_key_env: String,
    /// Environment variable that holds the Google API key (read at runtime).
    pub google_api_key_env: String,
    /// Per-provider request timeout in seconds.  A timed-out or failed call
    /// falls back to the deterministic generator; it never surfaces.
    pub openai_timeout_secs: u64,
    pub gemini_timeout_secs: u64,
    /// Model name forwarded to the OpenAI Responses API.
    pub openai_model: String,
    /// Model name forwarded to the Gemini generateContent API.
    pub gemini_model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            openai_api_key_env: "OPENAI_API_KEY".into(),
            google_api_key_env: "GOOGLE_API_KEY".into(),
            openai_timeout_secs: 30,
            gemini_timeout_secs: 25,
            openai_model: "gpt-4o-mini".into(),
            gemini_model: "gemini-1.5-flash".into(),
        }
    }
}

/// Anti-cheat policy thresholds.  See the policy crate for how each field
/// drives pause/seal decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// FS_EXIT strikes at which an Active session is auto-paused.
    pub fs_exit_pause_at: u32,
    /// FS_EXIT strikes at which the session is sealed.
    pub fs_exit_seal_at: u32,
    /// FACE_MISSING red strikes at which the session is sealed.
    pub face_missing_seal_at: u32,
    /// FACE_MISSING duration (seconds) above which the strike is red.
    pub face_missing_red_secs: f64,
    /// TAB_SWITCH count above which the strike escalates to red (warning
    /// only — no seal).
    pub tab_switch_limit: u32,
    /// Seal immediately on any SCREENSHOT_ATTEMPT.
    #[serde(default = "default_true")]
    pub seal_on_screenshot: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            fs_exit_pause_at: 2,
            fs_exit_seal_at: 3,
            face_missing_seal_at: 3,
            face_missing_red_secs: 2.0,
            tab_switch_limit: 3,
            seal_on_screenshot: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Interpreter executable used to run candidate code.
    pub python_bin: String,
    /// Hard wall-clock limit per test case, in milliseconds.
    pub test_timeout_ms: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            python_bin: "python3".into(),
            test_timeout_ms: 1000,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
