use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::artifact::{self, ArtifactStore};
use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::expiry;

#[derive(Debug, Serialize)]
pub struct ActivationInfo {
    pub id: String,
    pub account_login: String,
    pub account_server: String,
    pub is_active: bool,
    pub activated_at: i64,
    pub deactivated_at: Option<i64>,
}

impl From<crate::models::Activation> for ActivationInfo {
    fn from(a: crate::models::Activation) -> Self {
        Self {
            id: a.id,
            account_login: a.account_login,
            account_server: a.account_server,
            is_active: a.is_active,
            activated_at: a.activated_at,
            deactivated_at: a.deactivated_at,
        }
    }
}

/// Activation listing for a license. Counts are derived live from the
/// activation rows, never from a stored counter.
#[derive(Debug, Serialize)]
pub struct LicenseInfoResponse {
    pub license_id: String,
    pub product_name: String,
    pub max_activations: i64,
    pub current_activations: i64,
    pub available_activations: i64,
    pub activations: Vec<ActivationInfo>,
}

impl From<queries::ActivationSummary> for LicenseInfoResponse {
    fn from(summary: queries::ActivationSummary) -> Self {
        Self {
            license_id: summary.license.license_id,
            product_name: summary.product.name,
            max_activations: summary.product.max_activations,
            current_activations: summary.current_activations,
            available_activations: summary.product.max_activations - summary.current_activations,
            activations: summary.activations.into_iter().map(Into::into).collect(),
        }
    }
}

pub async fn list_activations(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
) -> Result<Json<LicenseInfoResponse>> {
    let conn = state.db.get()?;
    let summary = queries::activation_summary(&conn, &license_id)?;
    Ok(Json(summary.into()))
}

#[derive(Debug, Deserialize)]
pub struct ActivateRequest {
    pub account_login: String,
    pub account_server: String,
}

#[derive(Debug, Serialize)]
pub struct ActivateResponse {
    pub activation: ActivationInfo,
    pub available_activations: i64,
}

pub async fn activate_account(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
    Json(request): Json<ActivateRequest>,
) -> Result<(StatusCode, Json<ActivateResponse>)> {
    let mut conn = state.db.get()?;

    let activation = queries::activate_account(
        &mut conn,
        &license_id,
        &request.account_login,
        &request.account_server,
    )?;

    let summary = queries::activation_summary(&conn, &license_id)?;
    Ok((
        StatusCode::CREATED,
        Json(ActivateResponse {
            activation: activation.into(),
            available_activations: summary.product.max_activations - summary.current_activations,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub message: String,
}

pub async fn deactivate_activation(
    State(state): State<AppState>,
    Path(activation_id): Path<String>,
) -> Result<Json<DeactivateResponse>> {
    let conn = state.db.get()?;
    queries::deactivate_activation(&conn, &activation_id)?;
    Ok(Json(DeactivateResponse {
        message: "Activation deactivated".to_string(),
    }))
}

#[derive(Debug, Serialize)]
pub struct GenerateArtifactResponse {
    pub filename: String,
    pub download_url: String,
}

/// Generate (or refresh) the signed artifact for a license. The file always
/// reflects the active activation set at this moment; the holder distributes
/// a fresh copy after any activation change.
pub async fn generate_artifact(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
) -> Result<Json<GenerateArtifactResponse>> {
    let conn = state.db.get()?;

    let license = queries::get_license_by_license_id(&conn, &license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;
    if !expiry::is_valid(&license) {
        return Err(AppError::Expired("License is inactive or expired".into()));
    }

    let product = queries::get_product_by_id(&conn, &license.product_id)?
        .ok_or_else(|| AppError::Internal("Product not found for license".into()))?;
    let active = queries::list_active_activations(&conn, &license.id)?;

    let payload = artifact::build_payload(&license, &product, &active, Utc::now().timestamp());
    let encoded = state.codec.encode(&payload)?;
    state.artifacts.write(&license.license_id, &encoded)?;

    tracing::info!(license_id = %license.license_id, accounts = active.len(), "generated artifact");

    Ok(Json(GenerateArtifactResponse {
        filename: ArtifactStore::filename(&license.license_id),
        download_url: format!("/licenses/{}/artifact", license.license_id),
    }))
}

pub async fn fetch_artifact(
    State(state): State<AppState>,
    Path(license_id): Path<String>,
) -> Result<Response> {
    let conn = state.db.get()?;

    // 404 for unknown licenses before touching the filesystem.
    queries::get_license_by_license_id(&conn, &license_id)?
        .ok_or_else(|| AppError::NotFound("License not found".into()))?;

    let contents = state
        .artifacts
        .read(&license_id)?
        .ok_or_else(|| AppError::NotFound("Artifact not generated yet".into()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!(
            "attachment; filename=\"{}\"",
            ArtifactStore::filename(&license_id)
        ))
        .map_err(|_| AppError::BadRequest("Invalid license ID".into()))?,
    );

    Ok((headers, contents).into_response())
}
