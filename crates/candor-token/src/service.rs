// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{Audience, Claims, RevocationSet, TokenError};

type HmacSha256 = Hmac<Sha256>;

/// Everything needed to mint one token.  Built fluently:
///
/// ```
/// use candor_token::{Audience, MintSpec, TokenService};
/// let svc = TokenService::new("secret");
/// let token = svc.mint(
///     MintSpec::new("a@b.c", "candidate", Audience::InterviewApi, 900)
///         .scope("interview:session:s1")
///         .session("s1"),
/// );
/// assert!(svc.verify(&token, Audience::InterviewApi).is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct MintSpec {
    sub: String,
    role: String,
    scopes: Vec<String>,
    aud: Audience,
    ttl_seconds: u64,
    session_id: Option<String>,
    device_id: Option<String>,
    client_ip: Option<String>,
    extras: serde_json::Map<String, serde_json::Value>,
}

impl MintSpec {
    pub fn new(sub: impl Into<String>, role: impl Into<String>, aud: Audience, ttl_seconds: u64) -> Self {
        Self {
            sub: sub.into(),
            role: role.into(),
            scopes: Vec::new(),
            aud,
            ttl_seconds,
            session_id: None,
            device_id: None,
            client_ip: None,
            extras: serde_json::Map::new(),
        }
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    pub fn session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    /// Bind the token to a client IP.  Only a short hash is embedded.
    pub fn client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    /// Attach an audience-specific extra claim (e.g. `remainingQuestions`).
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }
}

/// Mints and verifies compact HMAC tokens and owns the revocation set.
pub struct TokenService {
    key: Vec<u8>,
    revoked: RevocationSet,
    /// How long revocation entries are kept beyond `now`; must be ≥ the
    /// longest token TTL in use.
    revocation_ttl: i64,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self::with_revocation_ttl(secret, 3600)
    }

    pub fn with_revocation_ttl(secret: &str, revocation_ttl: i64) -> Self {
        Self {
            key: secret.as_bytes().to_vec(),
            revoked: RevocationSet::new(),
            revocation_ttl,
        }
    }

    /// Mint a signed compact token from `spec`.
    pub fn mint(&self, spec: MintSpec) -> String {
        self.mint_at(spec, Utc::now().timestamp())
    }

    fn mint_at(&self, spec: MintSpec, now: i64) -> String {
        let claims = Claims {
            sub: spec.sub,
            role: spec.role,
            scope: spec.scopes,
            aud: spec.aud.as_str().to_string(),
            iat: now,
            exp: now + spec.ttl_seconds as i64,
            jti: Uuid::new_v4().to_string(),
            session_id: spec.session_id,
            device_id: spec.device_id,
            ip: spec.client_ip.as_deref().map(ip_hash),
            extras: spec.extras,
        };
        // serde_json object keys are BTreeMap-ordered, so Value → String is
        // already the canonical form (sorted keys, compact separators).
        let value = serde_json::to_value(&claims).expect("claims serialize");
        let payload = URL_SAFE_NO_PAD.encode(value.to_string());
        let sig = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes()));
        format!("{payload}.{sig}")
    }

    /// Verify a token against an expected audience and return its claims.
    pub fn verify(&self, token: &str, expected: Audience) -> Result<Claims, TokenError> {
        self.verify_at(token, Some(expected), Utc::now().timestamp())
    }

    /// Verify everything except the audience.  Callers that want to tell a
    /// misrouted-but-genuine token apart from a forged one (403 vs 401)
    /// check `claims.aud` themselves.
    pub fn verify_any(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, None, Utc::now().timestamp())
    }

    fn verify_at(
        &self,
        token: &str,
        expected: Option<Audience>,
        now: i64,
    ) -> Result<Claims, TokenError> {
        let (payload_b64, sig_b64) = token.split_once('.').ok_or(TokenError::Invalid)?;
        let provided = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenError::Invalid)?;
        let computed = self.sign(payload_b64.as_bytes());
        if computed.ct_eq(&provided).unwrap_u8() != 1 {
            return Err(TokenError::Invalid);
        }

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Invalid)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;

        if let Some(expected) = expected {
            if claims.aud != expected.as_str() {
                return Err(TokenError::Invalid);
            }
        }
        // A token minted in the future is forged or badly clocked; either way
        // it does not verify.  60 s of skew is tolerated.
        if claims.iat > now + 60 {
            return Err(TokenError::Invalid);
        }
        if claims.scope.is_empty() {
            return Err(TokenError::Invalid);
        }
        if now >= claims.exp {
            return Err(TokenError::Expired);
        }
        if self.revoked.contains(&claims.jti, now) {
            return Err(TokenError::Revoked);
        }
        Ok(claims)
    }

    /// Revoke a token by jti.  The entry lives until `exp + revocation_ttl`
    /// margin so a still-valid token can never slip past.
    pub fn revoke(&self, jti: &str, reason: &str) {
        let now = Utc::now().timestamp();
        self.revoked.revoke(jti, reason, now, now + self.revocation_ttl);
    }

    /// Drop expired revocation entries.
    pub fn purge_revoked(&self) -> usize {
        self.revoked.purge_expired(Utc::now().timestamp())
    }

    fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.key).expect("hmac accepts any key length");
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }
}

/// 16-hex-char SHA-256 prefix of an IP address, as stored in the `ip` claim.
pub fn ip_hash(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    hex::encode(digest)[..16].to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::require_scope;

    fn svc() -> TokenService {
        TokenService::new("test-secret")
    }

    fn ist_spec() -> MintSpec {
        MintSpec::new("a@b.c", "candidate", Audience::InterviewApi, 900)
            .scope("interview:session:s1")
            .session("s1")
    }

    #[test]
    fn mint_verify_roundtrip_preserves_claims() {
        let svc = svc();
        let token = svc.mint(ist_spec().extra("remainingQuestions", serde_json::json!(5)));
        let claims = svc.verify(&token, Audience::InterviewApi).unwrap();
        assert_eq!(claims.sub, "a@b.c");
        assert_eq!(claims.role, "candidate");
        assert_eq!(claims.session_id.as_deref(), Some("s1"));
        assert_eq!(claims.extras["remainingQuestions"], 5);
        assert!(require_scope(&claims, "interview:session:s1").is_ok());
    }

    #[test]
    fn wrong_audience_is_invalid() {
        let svc = svc();
        let token = svc.mint(ist_spec());
        assert_eq!(
            svc.verify(&token, Audience::AiProxy),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let svc = svc();
        let token = svc.mint_at(ist_spec(), 1_000);
        // 900 s TTL → expired at 1 900
        assert_eq!(
            svc.verify_at(&token, Some(Audience::InterviewApi), 1_900),
            Err(TokenError::Expired)
        );
        assert!(svc
            .verify_at(&token, Some(Audience::InterviewApi), 1_899)
            .is_ok());
    }

    #[test]
    fn tampered_payload_is_invalid() {
        let svc = svc();
        let token = svc.mint(ist_spec());
        let (payload, sig) = token.split_once('.').unwrap();
        let mut forged_claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
        forged_claims["sub"] = serde_json::json!("intruder");
        let forged = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(forged_claims.to_string()),
            sig
        );
        assert_eq!(
            svc.verify(&forged, Audience::InterviewApi),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn garbage_is_invalid() {
        let svc = svc();
        assert_eq!(
            svc.verify("not-a-token", Audience::UserApi),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            svc.verify("a.b.c", Audience::UserApi),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn different_secret_does_not_verify() {
        let token = svc().mint(ist_spec());
        let other = TokenService::new("other-secret");
        assert_eq!(
            other.verify(&token, Audience::InterviewApi),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn revoked_jti_is_rejected() {
        let svc = svc();
        let token = svc.mint(ist_spec());
        let claims = svc.verify(&token, Audience::InterviewApi).unwrap();
        svc.revoke(&claims.jti, "rotation");
        assert_eq!(
            svc.verify(&token, Audience::InterviewApi),
            Err(TokenError::Revoked)
        );
    }

    #[test]
    fn tokens_without_scope_do_not_verify() {
        let svc = svc();
        let token = svc.mint(MintSpec::new("u", "candidate", Audience::UserApi, 60));
        assert_eq!(
            svc.verify(&token, Audience::UserApi),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn ip_hash_is_short_and_stable() {
        let h = ip_hash("203.0.113.7");
        assert_eq!(h.len(), 16);
        assert_eq!(h, ip_hash("203.0.113.7"));
        assert_ne!(h, ip_hash("203.0.113.8"));
    }

    #[test]
    fn verify_any_skips_only_the_audience_check() {
        let svc = svc();
        let token = svc.mint(ist_spec());
        let claims = svc.verify_any(&token).unwrap();
        assert_eq!(claims.aud, "interview-api");
        // Everything else still applies.
        assert_eq!(svc.verify_any("junk"), Err(TokenError::Invalid));
        svc.revoke(&claims.jti, "test");
        assert_eq!(svc.verify_any(&token), Err(TokenError::Revoked));
    }

    #[test]
    fn jti_is_unique_per_mint() {
        let svc = svc();
        let a = svc.verify(&svc.mint(ist_spec()), Audience::InterviewApi).unwrap();
        let b = svc.verify(&svc.mint(ist_spec()), Audience::InterviewApi).unwrap();
        assert_ne!(a.jti, b.jti);
    }
}
