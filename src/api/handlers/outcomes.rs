//! Outcome Log query endpoint.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{ListMeta, OutcomeListResponse, OutcomeQueryParams};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /outcomes`: Query webhook and job outcomes.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid filters or when the log cannot be
/// read.
#[utoipa::path(
    get,
    path = "/api/v1/outcomes",
    tag = "Outcomes",
    summary = "Query the Outcome Log",
    description = "Returns webhook and sync job outcomes, newest first, filtered by marketplace, kind, status and time range.",
    params(OutcomeQueryParams),
    responses(
        (status = 200, description = "Matching outcomes", body = OutcomeListResponse),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
        (status = 404, description = "Unknown marketplace", body = ErrorResponse),
        (status = 500, description = "Outcome Log unavailable", body = ErrorResponse),
    )
)]
pub async fn list_outcomes(
    State(state): State<AppState>,
    Query(params): Query<OutcomeQueryParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let query = params.into_query()?;
    let data = state.outcome_log.query(&query).await?;
    Ok(Json(OutcomeListResponse {
        meta: ListMeta {
            returned: data.len(),
            limit: query.effective_limit(),
        },
        data,
    }))
}

/// Outcome routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/outcomes", get(list_outcomes))
}
