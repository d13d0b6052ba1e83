//! Shared harness: the real router on an ephemeral port with test doubles
//! behind the service traits.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use marketsync_gateway::api;
use marketsync_gateway::app_state::AppState;
use marketsync_gateway::config::GatewayConfig;
use marketsync_gateway::domain::{ClassifiedEvent, Marketplace, Priority};
use marketsync_gateway::persistence::InMemoryOutcomeLog;
use marketsync_gateway::service::{
    CapabilityError, EventProcessor, ItemError, MarketplaceSync, SyncReport,
};

/// Forwards every processed event to the test.
#[derive(Debug)]
pub struct RecordingProcessor {
    tx: mpsc::UnboundedSender<ClassifiedEvent>,
}

#[async_trait]
impl EventProcessor for RecordingProcessor {
    async fn process(&self, event: ClassifiedEvent) {
        let _ = self.tx.send(event);
    }
}

/// Capability that reports a fixed outcome for every run and counts calls.
#[derive(Debug, Default)]
pub struct ScriptedSync {
    /// Items attempted per run.
    pub attempted: u64,
    /// Item ids that fail permanently in every run.
    pub failing_items: Vec<String>,
    /// Number of `sync` calls seen.
    pub calls: AtomicU64,
}

impl ScriptedSync {
    /// Every run attempts `attempted` items and fails `failing_items`.
    pub fn new(attempted: u64, failing_items: &[&str]) -> Self {
        Self {
            attempted,
            failing_items: failing_items.iter().map(|s| (*s).to_string()).collect(),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of `sync` calls seen.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketplaceSync for ScriptedSync {
    async fn sync(
        &self,
        _marketplace: Marketplace,
        _priority: Priority,
        _item_budget: usize,
    ) -> Result<SyncReport, CapabilityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self.failing_items.len() as u64;
        Ok(SyncReport {
            attempted: self.attempted,
            succeeded: self.attempted.saturating_sub(failed),
            errors: self
                .failing_items
                .iter()
                .map(|id| ItemError::permanent(id.as_str(), "rejected by marketplace"))
                .collect(),
        })
    }

    async fn retry_item(
        &self,
        _marketplace: Marketplace,
        _priority: Priority,
        item_id: &str,
    ) -> Result<(), ItemError> {
        Err(ItemError::permanent(item_id, "rejected by marketplace"))
    }
}

/// A running gateway.
#[derive(Debug)]
pub struct TestApp {
    /// `http://127.0.0.1:<port>`.
    pub base_url: String,
    /// HTTP client.
    pub client: reqwest::Client,
    /// State shared with the router.
    pub state: AppState,
    /// Events that reached the processor.
    pub processed: mpsc::UnboundedReceiver<ClassifiedEvent>,
}

impl TestApp {
    /// Absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Next processed event, if one arrives within `wait`.
    pub async fn next_processed(&mut self, wait: Duration) -> Option<ClassifiedEvent> {
        tokio::time::timeout(wait, self.processed.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Starts the gateway configured by `vars` with `capability` behind the
/// job executor.
pub async fn spawn_app(vars: &[(&str, &str)], capability: Arc<dyn MarketplaceSync>) -> TestApp {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let Ok(config) = GatewayConfig::from_lookup(|key| vars.get(key).cloned()) else {
        panic!("test configuration must load");
    };

    let (tx, processed) = mpsc::unbounded_channel();
    let (state, _worker) = AppState::new(
        config,
        Arc::new(InMemoryOutcomeLog::new(1_000)),
        capability,
        Arc::new(RecordingProcessor { tx }),
    );

    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind ephemeral port");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("local addr");
    };
    let app = api::build_router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestApp {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        state,
        processed,
    }
}
