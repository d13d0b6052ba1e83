//! Sync tier status, manual runs and rate window snapshots.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    RateLimitSnapshotResponse, RateWindowDto, TierListResponse, TierStatusDto, parse_marketplace,
};
use crate::app_state::AppState;
use crate::domain::{Priority, SyncJob};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /sync/tiers`: List every tier with its scheduling state.
#[utoipa::path(
    get,
    path = "/api/v1/sync/tiers",
    tag = "Sync",
    summary = "List sync tiers",
    description = "Returns every configured (marketplace, priority) tier with its state, last run and next due time.",
    responses(
        (status = 200, description = "Tier list", body = TierListResponse),
    )
)]
pub async fn list_tiers(State(state): State<AppState>) -> impl IntoResponse {
    let now = Utc::now();
    let data = state
        .scheduler
        .tiers()
        .await
        .iter()
        .map(|t| TierStatusDto::from_tier(t, now))
        .collect();
    Json(TierListResponse { data })
}

/// `POST /sync/{marketplace}/{priority}`: Run one tier now.
///
/// Waits for the run to finish and returns the job.
///
/// # Errors
///
/// Returns [`GatewayError`] when the tier does not exist (404), is already
/// running (409) or the rate limiter refused the run (429).
#[utoipa::path(
    post,
    path = "/api/v1/sync/{marketplace}/{priority}",
    tag = "Sync",
    summary = "Trigger a tier run",
    description = "Runs one tier immediately, outside the scheduler cadence. A counted run resets the tier's interval.",
    params(
        ("marketplace" = String, Path, description = "Marketplace slug"),
        ("priority" = String, Path, description = "`high`, `medium` or `low`"),
    ),
    responses(
        (status = 200, description = "Finished job", body = SyncJob),
        (status = 400, description = "Unknown priority", body = ErrorResponse),
        (status = 404, description = "Tier not configured", body = ErrorResponse),
        (status = 409, description = "Tier already running", body = ErrorResponse),
        (status = 429, description = "Rate limit exhausted", body = ErrorResponse),
    )
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    Path((marketplace, priority)): Path<(String, String)>,
) -> Result<impl IntoResponse, GatewayError> {
    let marketplace = parse_marketplace(&marketplace)?;
    let priority = priority
        .parse::<Priority>()
        .map_err(GatewayError::InvalidRequest)?;
    let job = state.scheduler.trigger(marketplace, priority).await?;
    Ok(Json(job))
}

/// `GET /rate-limits/{marketplace}`: Current rate windows.
///
/// # Errors
///
/// Returns [`GatewayError`] when the marketplace is unknown, not enabled,
/// or the limiter state is unusable.
#[utoipa::path(
    get,
    path = "/api/v1/rate-limits/{marketplace}",
    tag = "Sync",
    summary = "Rate window snapshot",
    description = "Returns the minute, hour and day windows of a marketplace as they stand now.",
    params(("marketplace" = String, Path, description = "Marketplace slug")),
    responses(
        (status = 200, description = "Window snapshot", body = RateLimitSnapshotResponse),
        (status = 404, description = "Unknown or disabled marketplace", body = ErrorResponse),
        (status = 503, description = "Rate limiter unavailable", body = ErrorResponse),
    )
)]
pub async fn rate_limits(
    State(state): State<AppState>,
    Path(marketplace): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let marketplace = parse_marketplace(&marketplace)?;
    let windows = state
        .rate_limiter
        .snapshot(marketplace, Utc::now())?
        .into_iter()
        .map(RateWindowDto::from)
        .collect();
    Ok(Json(RateLimitSnapshotResponse {
        marketplace,
        windows,
    }))
}

/// Sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/tiers", get(list_tiers))
        .route("/sync/{marketplace}/{priority}", post(trigger_sync))
        .route("/rate-limits/{marketplace}", get(rate_limits))
}
