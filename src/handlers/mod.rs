mod licenses;
mod purchase;
mod verify;

pub use licenses::*;
pub use purchase::*;
pub use verify::*;

use axum::{
    Json, Router,
    routing::{delete, get, post},
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::db::AppState;
use crate::rate_limit;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(standard_rpm: u32, relaxed_rpm: u32) -> Router<AppState> {
    // Verify and download calls come from customer sites and tooling on
    // arbitrary origins.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // License-holder endpoints plus the unauthenticated verifier. All are
    // public; the license_id (and account pair) acts as the bearer secret.
    let licensed = Router::new()
        .route(
            "/licenses/{license_id}/activations",
            get(list_activations).post(activate_account),
        )
        .route("/activations/{activation_id}", delete(deactivate_activation))
        .route(
            "/licenses/{license_id}/artifact",
            post(generate_artifact).get(fetch_artifact),
        )
        .route("/verify-account", post(verify_account))
        .layer(cors)
        .layer(rate_limit::standard_layer(standard_rpm));

    let health_routes = Router::new()
        .route("/health", get(health))
        .layer(rate_limit::relaxed_layer(relaxed_rpm));

    // Webhooks authenticate with their own HMAC; no IP rate limit.
    let webhooks = Router::new().route("/webhooks/purchase", post(purchase_completed));

    Router::new()
        .merge(licensed)
        .merge(health_routes)
        .merge(webhooks)
}
