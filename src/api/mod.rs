//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Operator endpoints are mounted under `/api/v1`; webhook ingestion and
//! system endpoints live at the root.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;
use axum::http::StatusCode;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use openapi::ApiDoc;

/// Builds the complete HTTP router over `state`.
///
/// Webhook requests are bounded by the configured request timeout and
/// answered with 503 when it elapses, so the marketplace redelivers.
pub fn build_router(state: AppState) -> Router {
    let webhook_timeout = state.config.webhook_request_timeout;
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::webhook::routes().layer(TimeoutLayer::with_status_code(
            StatusCode::SERVICE_UNAVAILABLE,
            webhook_timeout,
        )))
        .merge(handlers::system::routes());

    with_api_docs(router)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn with_api_docs(router: Router<AppState>) -> Router<AppState> {
    router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_api_docs(router: Router<AppState>) -> Router<AppState> {
    router.route(
        "/api-docs/openapi.json",
        axum::routing::get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::config::GatewayConfig;
    use crate::persistence::InMemoryOutcomeLog;
    use crate::service::{LoggingProcessor, UnconfiguredSync};

    fn router() -> Router {
        let Ok(config) = GatewayConfig::from_lookup(|key| {
            (key == "MARKETPLACES").then(|| "trendyol".to_string())
        }) else {
            panic!("config must load");
        };
        let (state, _worker) = AppState::new(
            config,
            Arc::new(InMemoryOutcomeLog::new(16)),
            Arc::new(UnconfiguredSync),
            Arc::new(LoggingProcessor),
        );
        build_router(state)
    }

    async fn status_of(request: Request<Body>) -> StatusCode {
        let Ok(response) = router().oneshot(request).await else {
            panic!("router is infallible");
        };
        response.status()
    }

    #[tokio::test]
    async fn health_is_served_at_root() {
        let Ok(request) = Request::get("/health").body(Body::empty()) else {
            panic!("valid request");
        };
        assert_eq!(status_of(request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn webhook_for_unknown_marketplace_is_not_found() {
        let Ok(request) = Request::post("/webhooks/etsy").body(Body::from("{}")) else {
            panic!("valid request");
        };
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsigned_webhook_is_unauthorized() {
        let Ok(request) = Request::post("/webhooks/trendyol")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"eventType":"ORDER_CREATED"}"#))
        else {
            panic!("valid request");
        };
        assert_eq!(status_of(request).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn operator_routes_live_under_api_v1() {
        let Ok(request) = Request::get("/api/v1/sync/tiers").body(Body::empty()) else {
            panic!("valid request");
        };
        assert_eq!(status_of(request).await, StatusCode::OK);

        let Ok(request) = Request::get("/sync/tiers").body(Body::empty()) else {
            panic!("valid request");
        };
        assert_eq!(status_of(request).await, StatusCode::NOT_FOUND);
    }
}
