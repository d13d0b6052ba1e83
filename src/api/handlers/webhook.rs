//! Inbound webhook endpoint.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{WebhookResponse, parse_marketplace};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /webhooks/{marketplace}`: Receive one marketplace delivery.
///
/// The body is read as raw bytes so the signature is checked against
/// exactly what the marketplace sent.
///
/// # Errors
///
/// Returns [`GatewayError`] when the marketplace is unknown or not enabled.
/// Verification and dispatch failures are regular responses carrying
/// `status: "rejected"`.
#[utoipa::path(
    post,
    path = "/webhooks/{marketplace}",
    tag = "Webhooks",
    summary = "Receive a marketplace webhook",
    description = "Verifies the HMAC signature over the raw body, classifies the event and hands it to the dispatch queue. 200 means the event was accepted; 503 asks the marketplace to redeliver.",
    params(("marketplace" = String, Path, description = "Marketplace slug, e.g. `trendyol`")),
    request_body(content = String, content_type = "application/json", description = "Marketplace payload, signed byte for byte"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookResponse),
        (status = 400, description = "Payload is not a JSON object", body = WebhookResponse),
        (status = 401, description = "Signature missing or invalid", body = WebhookResponse),
        (status = 404, description = "Unknown or disabled marketplace", body = ErrorResponse),
        (status = 503, description = "Dispatch queue unavailable; redeliver later", body = WebhookResponse),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(marketplace): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let marketplace = parse_marketplace(&marketplace)?;
    let receipt = state.webhooks.receive(marketplace, &headers, body).await?;
    let status = receipt.status_code();
    Ok((status, Json(WebhookResponse::from(receipt))))
}

/// Webhook routes mounted at the root level.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/{marketplace}", post(receive_webhook))
}
