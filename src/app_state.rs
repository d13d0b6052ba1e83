//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::GatewayConfig;
use crate::persistence::OutcomeLog;
use crate::service::{
    EventClassifier, EventDispatcher, EventProcessor, ExecutorConfig, JobExecutor,
    MarketplaceSync, QueueDispatcher, RateLimiter, SyncScheduler, WebhookGateway,
};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Startup configuration.
    pub config: Arc<GatewayConfig>,
    /// Inbound webhook pipeline.
    pub webhooks: WebhookGateway,
    /// Tier scheduler; also serves manual runs.
    pub scheduler: SyncScheduler,
    /// Outbound rate limiter shared with the scheduler's executor.
    pub rate_limiter: Arc<RateLimiter>,
    /// Outcome Log read by dashboards.
    pub outcome_log: Arc<dyn OutcomeLog>,
}

impl AppState {
    /// Wires every component from `config`.
    ///
    /// Spawns the dispatch worker on the current Tokio runtime and returns
    /// its handle. The worker exits once every clone of the state has been
    /// dropped and the queue is drained.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        outcome_log: Arc<dyn OutcomeLog>,
        capability: Arc<dyn MarketplaceSync>,
        processor: Arc<dyn EventProcessor>,
    ) -> (Self, JoinHandle<()>) {
        let rate_limiter = Arc::new(RateLimiter::new(
            config
                .marketplaces
                .iter()
                .map(|m| (m.marketplace, m.rate_limits)),
        ));

        let classifier = EventClassifier::new(
            config
                .marketplaces
                .iter()
                .map(|m| (m.marketplace, m.event_map.clone())),
        );
        let (dispatcher, worker) = QueueDispatcher::spawn(
            config.dispatch_queue_capacity,
            config.webhook_enqueue_timeout,
            config.dedupe_window,
            processor,
        );
        let dispatcher: Arc<dyn EventDispatcher> = Arc::new(dispatcher);
        let webhooks = WebhookGateway::new(
            config.marketplaces.iter().map(|m| m.webhook_descriptor()),
            classifier,
            dispatcher,
            Arc::clone(&outcome_log),
        );

        let executor = JobExecutor::new(
            Arc::clone(&rate_limiter),
            capability,
            Arc::clone(&outcome_log),
            ExecutorConfig {
                max_duration: config.job_max_duration,
                item_max_retries: config.item_max_retries,
            },
        );
        let scheduler = SyncScheduler::new(
            config
                .marketplaces
                .iter()
                .flat_map(|m| m.sync_tiers())
                .collect(),
            config.marketplace_worker_slots,
            executor,
            config.scheduler_tick,
        );

        tracing::info!(
            marketplaces = config.marketplaces.len(),
            persistence = config.persistence_enabled,
            "application state assembled"
        );

        (
            Self {
                config: Arc::new(config),
                webhooks,
                scheduler,
                rate_limiter,
                outcome_log,
            },
            worker,
        )
    }
}
