//! System endpoints: health check and marketplace configuration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::config::MarketplaceConfig;
use crate::domain::{Marketplace, Priority, RateLimits};
use crate::service::SignatureAlgorithm;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Public view of one tier's configuration.
#[derive(Debug, Serialize, ToSchema)]
pub struct TierInfo {
    priority: Priority,
    interval_secs: u64,
    item_budget: usize,
}

/// Public view of one marketplace's configuration. Never carries the secret.
#[derive(Debug, Serialize, ToSchema)]
pub struct MarketplaceInfo {
    marketplace: Marketplace,
    secret_configured: bool,
    signature_algorithm: SignatureAlgorithm,
    signature_header: String,
    rate_limits: RateLimits,
    tiers: Vec<TierInfo>,
    extra_event_mappings: usize,
}

impl From<&MarketplaceConfig> for MarketplaceInfo {
    fn from(m: &MarketplaceConfig) -> Self {
        Self {
            marketplace: m.marketplace,
            secret_configured: m.webhook_secret.is_some(),
            signature_algorithm: m.signature_algorithm,
            signature_header: m.signature_header.clone(),
            rate_limits: m.rate_limits,
            tiers: m
                .tiers
                .iter()
                .map(|t| TierInfo {
                    priority: t.priority,
                    interval_secs: t.interval.as_secs(),
                    item_budget: t.item_budget,
                })
                .collect(),
            extra_event_mappings: m.event_map.len(),
        }
    }
}

/// `GET /config/marketplaces`: Enabled marketplaces.
#[utoipa::path(
    get,
    path = "/config/marketplaces",
    tag = "System",
    summary = "List enabled marketplaces",
    description = "Returns signature scheme, rate ceilings and tiers per enabled marketplace. Secrets are reported only as present or absent.",
    responses(
        (status = 200, description = "Marketplace catalog", body = Vec<MarketplaceInfo>),
    )
)]
pub async fn marketplaces_handler(State(state): State<AppState>) -> impl IntoResponse {
    let info: Vec<MarketplaceInfo> = state
        .config
        .marketplaces
        .iter()
        .map(MarketplaceInfo::from)
        .collect();
    (StatusCode::OK, Json(info))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/marketplaces", get(marketplaces_handler))
}
