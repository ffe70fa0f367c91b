// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Router-level tests: the full REST surface against the in-process stack.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use candor_config::Settings;
use candor_gateway::{http, AppState};

fn test_state() -> AppState {
    let mut settings = Settings::default();
    settings.auth.signing_secret = "api-test-secret".into();
    // "scripted" is not a known provider name, so the proxy runs the
    // deterministic fallback — no network, stable outputs.
    settings.ai.provider = "scripted".into();
    AppState::from_settings(settings)
}

fn app(state: &AppState) -> Router {
    http::router(state.clone())
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    req
}

fn with_cookie(mut req: Request<Body>, cookie: &str) -> Request<Body> {
    req.headers_mut()
        .insert(header::COOKIE, format!("session={cookie}").parse().unwrap());
    req
}

fn session_config(modes: &[&str], question_count: u32) -> serde_json::Value {
    serde_json::json!({
        "roleCategory": "Backend Engineer",
        "experienceYears": 3,
        "experienceMonths": 0,
        "modes": modes,
        "questionCount": question_count,
        "durationLimit": 30,
        "language": "en",
        "difficulty": "medium",
        "consentRecording": true,
        "consentAntiCheat": true,
        "consentTimestamp": "2026-01-01T00:00:00Z"
    })
}

struct LoggedIn {
    user_token: String,
    session_cookie: String,
}

async fn login(state: &AppState) -> LoggedIn {
    let resp = app(state)
        .oneshot(post_json(
            "/auth/login",
            serde_json::json!({"email": "A@B.c", "name": "Alex"}),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Strict"));
    let session_cookie = set_cookie
        .strip_prefix("session=")
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    LoggedIn {
        user_token: body["token"].as_str().unwrap().to_string(),
        session_cookie,
    }
}

/// create → precheck → start; returns (sessionId, ist, wst, aipt, acet).
async fn start_session(
    state: &AppState,
    auth: &LoggedIn,
    modes: &[&str],
    question_count: u32,
) -> (String, String, String, String, String) {
    let (status, body) = send(
        app(state),
        with_bearer(
            post_json("/interview/sessions", session_config(modes, question_count)),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let session_id = body["sessionId"].as_str().unwrap().to_string();
    let ist = body["ist"].as_str().unwrap().to_string();
    assert_eq!(body["nextStep"], "precheck");

    let (status, body) = send(
        app(state),
        with_cookie(
            post_json(&format!("/interview/{session_id}/token/acet"), serde_json::json!({})),
            &auth.session_cookie,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let acet = body["acet"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(state),
        with_bearer(
            post_json(
                &format!("/interview/{session_id}/precheck"),
                serde_json::json!({"checks": {"network": {"status": "pass"}}, "events": []}),
            ),
            &acet,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["overallStatus"], "pass");
    assert_eq!(body["canProceed"], true);

    let (status, body) = send(
        app(state),
        with_cookie(
            post_json(&format!("/interview/{session_id}/start"), serde_json::json!({})),
            &auth.session_cookie,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let wst = body["wst"].as_str().unwrap().to_string();
    let aipt = body["aipt"].as_str().unwrap().to_string();
    assert_eq!(body["nextStep"], "interview");

    (session_id, ist, wst, aipt, acet)
}

// ── Auth failures ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_session_without_bearer_is_401() {
    let state = test_state();
    let (status, body) = send(
        app(&state),
        post_json("/interview/sessions", session_config(&["behavioral"], 1)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "missing_bearer");
}

#[tokio::test]
async fn start_without_cookie_is_401() {
    let state = test_state();
    let (status, body) = send(
        app(&state),
        post_json("/interview/whatever/start", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "missing_session");
}

#[tokio::test]
async fn consent_is_required() {
    let state = test_state();
    let auth = login(&state).await;
    let mut config = session_config(&["behavioral"], 1);
    config["consentAntiCheat"] = serde_json::json!(false);
    let (status, body) = send(
        app(&state),
        with_bearer(post_json("/interview/sessions", config), &auth.user_token),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "consent_required");
}

// ── S6: scope enforcement ─────────────────────────────────────────────────────

#[tokio::test]
async fn ist_presented_where_aipt_is_required_is_403() {
    let state = test_state();
    let auth = login(&state).await;
    let (session_id, ist, _wst, _aipt, _acet) =
        start_session(&state, &auth, &["behavioral"], 2).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/next-question"), serde_json::json!({})),
            &ist,
        ),
    )
    .await;
    // Genuinely signed token, wrong audience: authorization failure.
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "insufficient_scope");

    // A forged token is still an authentication failure.
    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/next-question"), serde_json::json!({})),
            "forged.token",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "invalid_token");
}

#[tokio::test]
async fn aipt_for_another_session_is_403() {
    let state = test_state();
    let auth = login(&state).await;
    let (_session_a, _ist_a, _wst_a, aipt_a, _) =
        start_session(&state, &auth, &["behavioral"], 2).await;
    let (session_b, _ist_b, _wst_b, _aipt_b, _) =
        start_session(&state, &auth, &["behavioral"], 2).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_b}/next-question"), serde_json::json!({})),
            &aipt_a,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "insufficient_scope");
}

#[tokio::test]
async fn ist_for_another_session_is_403() {
    let state = test_state();
    let auth = login(&state).await;
    let (_session_a, ist_a, _wst, _aipt, _) =
        start_session(&state, &auth, &["behavioral"], 1).await;
    let (session_b, _ist_b, _wst_b, _aipt_b, _) =
        start_session(&state, &auth, &["behavioral"], 1).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_b}/finalize"), serde_json::json!({})),
            &ist_a,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["detail"], "insufficient_scope");
}

// ── S1: happy path ────────────────────────────────────────────────────────────

#[tokio::test]
async fn one_question_behavioral_happy_path() {
    let state = test_state();
    let auth = login(&state).await;
    let (session_id, ist, _wst, aipt, _acet) =
        start_session(&state, &auth, &["behavioral"], 1).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/next-question"), serde_json::json!({})),
            &aipt,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["questionNumber"], 1);
    assert_eq!(body["totalQuestions"], 1);
    assert_eq!(body["type"], "behavioral");
    let question_id = body["questionId"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(
                &format!("/interview/{session_id}/answer"),
                serde_json::json!({
                    "questionId": question_id,
                    "answerType": "text",
                    "responseText": "I led the migration and cut costs by 30 percent."
                }),
            ),
            &ist,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "submitted");
    assert!(body["immediateFeedback"]["score"].is_u64());

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/finalize"), serde_json::json!({})),
            &ist,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "Completed");

    let (status, body) = send(
        app(&state),
        with_bearer(
            Request::get(format!("/interview/{session_id}/summary"))
                .body(Body::empty())
                .unwrap(),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    for axis in ["communication", "problem_solving", "technical"] {
        assert!(body["rubric"][axis].is_u64(), "missing rubric axis {axis}");
    }

    let (status, body) = send(
        app(&state),
        with_bearer(
            Request::get(format!("/interview/{session_id}/state"))
                .body(Body::empty())
                .unwrap(),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "Completed");
    assert_eq!(body["askedCount"], 1);
}

// ── S2: chain replay over HTTP ────────────────────────────────────────────────

#[tokio::test]
async fn replayed_event_batch_is_rejected_and_tail_unchanged() {
    let state = test_state();
    let auth = login(&state).await;
    let (session_id, _ist, _wst, _aipt, acet) =
        start_session(&state, &auth, &["behavioral"], 1).await;

    let batch = serde_json::json!({
        "events": [{
            "sessionId": session_id,
            "seq": 1,
            "type": "FS_EXIT",
            "ts": "T1",
            "details": {},
            "prevHash": ""
        }]
    });

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/anti-cheat"), batch.clone()),
            &acet,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["tailSeq"], 1);
    let tail_hash = body["tailHash"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/anti-cheat"), batch),
            &acet,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "event_seq_replay_or_out_of_order");

    let (status, body) = send(
        app(&state),
        with_bearer(
            Request::get(format!("/interview/{session_id}/anti-cheat/tail"))
                .body(Body::empty())
                .unwrap(),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["seq"], 1);
    assert_eq!(body["hash"], tail_hash.as_str());
}

// ── S3: auto-seal over HTTP ───────────────────────────────────────────────────

#[tokio::test]
async fn screenshot_attempt_seals_the_session() {
    let state = test_state();
    let auth = login(&state).await;
    let (session_id, ist, _wst, _aipt, acet) =
        start_session(&state, &auth, &["behavioral"], 1).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(
                &format!("/interview/{session_id}/anti-cheat"),
                serde_json::json!({
                    "events": [{
                        "sessionId": session_id,
                        "seq": 1,
                        "type": "SCREENSHOT_ATTEMPT",
                        "ts": "T1",
                        "details": {},
                        "prevHash": ""
                    }]
                }),
            ),
            &acet,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(
        app(&state),
        with_bearer(
            Request::get(format!("/interview/{session_id}/state"))
                .body(Body::empty())
                .unwrap(),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "Ended");

    // Terminal session: further mutating calls conflict.
    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/finalize"), serde_json::json!({})),
            &ist,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["detail"], "invalid_state");

    // The summary exists and is readable.
    let (status, _body) = send(
        app(&state),
        with_bearer(
            Request::get(format!("/interview/{session_id}/summary"))
                .body(Body::empty())
                .unwrap(),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ── S5: code eval over HTTP ───────────────────────────────────────────────────

#[tokio::test]
async fn code_eval_runs_tests_and_rejects_disallowed_code() {
    let state = test_state();
    let auth = login(&state).await;
    let (session_id, ist, _wst, _aipt, _acet) =
        start_session(&state, &auth, &["coding"], 1).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(
                &format!("/interview/{session_id}/code-eval"),
                serde_json::json!({
                    "code": "def solve(a): return sorted(a)",
                    "functionName": "solve",
                    "tests": [
                        {"input": [[3, 1, 2]], "expected": [1, 2, 3]},
                        {"input": [[]], "expected": []}
                    ]
                }),
            ),
            &ist,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["passed"], 2);
    assert_eq!(body["total"], 2);

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(
                &format!("/interview/{session_id}/code-eval"),
                serde_json::json!({
                    "code": "import os\ndef solve(a): return a",
                    "functionName": "solve",
                    "tests": []
                }),
            ),
            &ist,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "disallowed_code");
}

// ── Pacing over HTTP ──────────────────────────────────────────────────────────

#[tokio::test]
async fn question_pacing_returns_429() {
    let state = test_state();
    let auth = login(&state).await;
    let (session_id, ist, _wst, aipt, _acet) =
        start_session(&state, &auth, &["behavioral"], 3).await;

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/next-question"), serde_json::json!({})),
            &aipt,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let question_id = body["questionId"].as_str().unwrap().to_string();

    let (status, _body) = send(
        app(&state),
        with_bearer(
            post_json(
                &format!("/interview/{session_id}/answer"),
                serde_json::json!({
                    "questionId": question_id,
                    "answerType": "text",
                    "responseText": "answered"
                }),
            ),
            &ist,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json(&format!("/interview/{session_id}/next-question"), serde_json::json!({})),
            &aipt,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["detail"], "rate_limited");
}

// ── Token refresh ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_returns_wst_only_while_active() {
    let state = test_state();
    let auth = login(&state).await;

    // Before start: no WST.
    let (status, body) = send(
        app(&state),
        with_bearer(
            post_json("/interview/sessions", session_config(&["behavioral"], 1)),
            &auth.user_token,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = body["sessionId"].as_str().unwrap().to_string();

    let (status, body) = send(
        app(&state),
        with_cookie(
            post_json(&format!("/interview/{session_id}/token/refresh"), serde_json::json!({})),
            &auth.session_cookie,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["ist"].is_string());
    assert!(body["wst"].is_null());
}

// ── Media upload ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn media_upload_stores_bytes_and_returns_checksum() {
    use sha2::{Digest, Sha256};

    let mut settings = Settings::default();
    settings.auth.signing_secret = "api-test-secret".into();
    settings.ai.provider = "scripted".into();
    let dir = tempfile::tempdir().unwrap();
    settings.server.upload_dir = dir.path().to_string_lossy().to_string();
    let state = AppState::from_settings(settings);

    let auth = login(&state).await;
    let (session_id, _ist, _wst, _aipt, _acet) =
        start_session(&state, &auth, &["behavioral"], 1).await;

    let (status, body) = send(
        app(&state),
        with_cookie(
            post_json(
                &format!("/media/issue-upt?sessionId={session_id}"),
                serde_json::json!({}),
            ),
            &auth.session_cookie,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let upt = body["upt"].as_str().unwrap().to_string();

    let payload = b"webm-bytes-go-here".to_vec();
    let boundary = "candor-test-boundary";
    let mut multipart = Vec::new();
    multipart.extend_from_slice(
        format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"clip.webm\"\r\ncontent-type: video/webm\r\n\r\n"
        )
        .as_bytes(),
    );
    multipart.extend_from_slice(&payload);
    multipart.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::post(format!("/media/upload?token={upt}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(multipart))
        .unwrap();
    let (status, body) = send(app(&state), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(
        body["checksum"].as_str().unwrap(),
        hex::encode(Sha256::digest(&payload))
    );
    let stored = tokio::fs::read(body["url"].as_str().unwrap()).await.unwrap();
    assert_eq!(stored, payload);
}
