//! OpenAPI document for the HTTP surface.

use utoipa::OpenApi;

use super::handlers::{outcomes, sync, system, webhook};

/// Generated OpenAPI description of every endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "marketsync-gateway",
        description = "Webhook ingestion and priority-tiered synchronization for e-commerce marketplaces."
    ),
    paths(
        webhook::receive_webhook,
        outcomes::list_outcomes,
        sync::list_tiers,
        sync::trigger_sync,
        sync::rate_limits,
        system::health_handler,
        system::marketplaces_handler,
    ),
    tags(
        (name = "Webhooks", description = "Inbound marketplace deliveries"),
        (name = "Outcomes", description = "Webhook and job audit trail"),
        (name = "Sync", description = "Priority-tier synchronization"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_endpoint() {
        let doc = ApiDoc::openapi();
        for path in [
            "/webhooks/{marketplace}",
            "/api/v1/outcomes",
            "/api/v1/sync/tiers",
            "/api/v1/sync/{marketplace}/{priority}",
            "/api/v1/rate-limits/{marketplace}",
            "/health",
            "/config/marketplaces",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
