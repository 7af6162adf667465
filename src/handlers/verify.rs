use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use super::licenses::LicenseInfoResponse;
use crate::db::{AppState, queries};
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub license_id: String,
    pub account_login: String,
    pub account_server: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub is_valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_info: Option<LicenseInfoResponse>,
}

/// Online authorization check for network-capable clients.
///
/// Unauthenticated by design: the (license_id, account) pair is the bearer
/// secret. Every failure path returns the same negative shape and message so
/// the response cannot be used to probe which part of the tuple was wrong;
/// the specific reason is only logged server-side (queries::verify_account).
pub async fn verify_account(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let conn = state.db.get()?;

    let summary = queries::verify_account(
        &conn,
        &request.license_id,
        &request.account_login,
        &request.account_server,
    )?;

    Ok(Json(match summary {
        Some(summary) => VerifyResponse {
            is_valid: true,
            message: "Account authorized".to_string(),
            license_info: Some(summary.into()),
        },
        None => VerifyResponse {
            is_valid: false,
            message: "License or account not authorized".to_string(),
            license_info: None,
        },
    }))
}
