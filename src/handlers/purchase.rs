use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::PurchaseCompleted;

type HmacSha256 = Hmac<Sha256>;

/// Verify the hex HMAC-SHA256 of the raw body against the shared secret.
fn verify_signature(secret: &[u8], payload: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload);
    let expected = mac.finalize().into_bytes();

    let Ok(presented) = hex::decode(signature_hex) else {
        return false;
    };
    presented.ct_eq(expected.as_slice()).unwrap_u8() == 1
}

#[derive(Debug, Serialize)]
pub struct IssueResponse {
    pub license_id: String,
    pub product_id: String,
    pub is_rental: bool,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

/// Consume a purchase-completed event and issue the license.
///
/// The checkout collaborator delivers this at least once; redeliveries return
/// the already-issued license with 200 instead of creating a duplicate.
pub async fn purchase_completed(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IssueResponse>)> {
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if !verify_signature(state.webhook_secret.as_bytes(), &body, signature) {
        tracing::warn!("purchase webhook rejected: bad signature");
        return Err(AppError::Unauthorized);
    }

    let event: PurchaseCompleted = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid purchase event: {}", e)))?;

    let mut conn = state.db.get()?;
    let license = queries::issue_license(&mut conn, &event)?;

    Ok((
        StatusCode::OK,
        Json(IssueResponse {
            license_id: license.license_id,
            product_id: license.product_id,
            is_rental: license.is_rental,
            expires_at: license.expires_at,
            created_at: license.created_at,
        }),
    ))
}
