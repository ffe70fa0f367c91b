// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Blanket security headers applied to every response.
//!
//! | Header                    | Value                             |
//! |---------------------------|-----------------------------------|
//! | `X-Content-Type-Options`  | `nosniff`                         |
//! | `X-Frame-Options`         | `DENY`                            |
//! | `Referrer-Policy`         | `strict-origin-when-cross-origin` |
//! | `Permissions-Policy`      | camera/mic/geolocation disabled   |
//!
//! The candidate webcam/microphone run in the *frontend* origin, not ours —
//! this API never needs those permissions itself.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

static NO_SNIFF: HeaderValue = HeaderValue::from_static("nosniff");
static DENY_FRAME: HeaderValue = HeaderValue::from_static("DENY");
static REFERRER: HeaderValue = HeaderValue::from_static("strict-origin-when-cross-origin");
static PERMISSIONS: HeaderValue =
    HeaderValue::from_static("camera=(), microphone=(), geolocation=()");

/// Append security headers to every outgoing response.
pub async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let h = resp.headers_mut();
    h.insert(axum::http::header::X_CONTENT_TYPE_OPTIONS, NO_SNIFF.clone());
    h.insert(axum::http::header::X_FRAME_OPTIONS, DENY_FRAME.clone());
    h.insert(axum::http::header::REFERRER_POLICY, REFERRER.clone());
    h.insert("permissions-policy", PERMISSIONS.clone());
    resp
}
