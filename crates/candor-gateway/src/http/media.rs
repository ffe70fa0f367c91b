// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//!
//! Media ingest: UPT issuance and the upload sink.
//!
//! Uploads authenticate with the UPT passed as a query parameter (media
//! recorders can't always set headers on multipart posts).  The payload is
//! hashed before it is written, and the checksum goes back to the client so
//! it can verify what landed.

use axum::extract::{Multipart, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use candor_store::new_id;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUptQuery {
    pub session_id: String,
}

/// POST /media/issue-upt?sessionId=… (session cookie).
pub async fn issue_upt(
    State(state): State<AppState>,
    Query(query): Query<IssueUptQuery>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.auth_session(&headers)?;
    Ok(Json(serde_json::json!({
        "upt": state.mint_upt(&query.session_id),
    })))
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub token: String,
}

/// POST /media/upload?token=UPT — multipart body, first file field wins.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (_claims, session_id) = state.auth_upt(&query.token)?;

    let mut file_name = String::from("blob");
    let mut data: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("invalid_multipart"))?
    {
        if let Some(name) = field.file_name() {
            file_name = sanitize_file_name(name);
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|_| ApiError::bad_request("invalid_multipart"))?;
        data = Some(bytes.to_vec());
        break;
    }
    let data = data.ok_or_else(|| ApiError::bad_request("missing_file"))?;

    let checksum = hex::encode(Sha256::digest(&data));
    let dir = state.settings.server.upload_dir.clone();
    let path = format!("{dir}/{session_id}_{}_{file_name}", new_id());

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    tokio::fs::write(&path, &data)
        .await
        .map_err(|e| ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    info!(session = %session_id, path = %path, bytes = data.len(), "media stored");
    Ok(Json(serde_json::json!({
        "url": path,
        "checksum": checksum,
    })))
}

/// Keep only the final path component and benign characters; uploads must
/// not be able to name their way out of the upload directory.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "blob".into()
    } else {
        cleaned
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
