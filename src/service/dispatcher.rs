//! Hand-off of classified events to their handlers.
//!
//! The gateway only waits until an event is accepted by an
//! [`EventDispatcher`]. [`QueueDispatcher`] accepts an event by placing it on
//! a bounded channel; a background worker drains the channel into an
//! [`EventProcessor`]. Repeated deliveries of the same marketplace event are
//! dropped by an [`IdempotencyGuard`] before they reach the processor.

use std::collections::{HashSet, VecDeque};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;

use crate::domain::{ClassifiedEvent, Marketplace};

/// Why an event could not be handed off.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The queue stayed full for the whole enqueue timeout.
    #[error("dispatch queue full, gave up after {0:?}")]
    QueueFull(Duration),

    /// The worker is gone.
    #[error("dispatch queue closed")]
    Closed,
}

/// Accepts classified events for processing.
#[async_trait]
pub trait EventDispatcher: Send + Sync + Debug {
    /// Returns once the event has been accepted, not processed.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the event could not be accepted.
    async fn dispatch(&self, event: ClassifiedEvent) -> Result<(), DispatchError>;
}

/// Performs the actual work for a classified event.
///
/// Implementations must tolerate duplicates: delivery is at-least-once.
#[async_trait]
pub trait EventProcessor: Send + Sync + Debug {
    /// Processes one event.
    async fn process(&self, event: ClassifiedEvent);
}

/// Default processor: records the routing decision in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingProcessor;

#[async_trait]
impl EventProcessor for LoggingProcessor {
    async fn process(&self, event: ClassifiedEvent) {
        tracing::info!(
            event_id = %event.event_id,
            marketplace = %event.marketplace,
            event_type = %event.event_type,
            marketplace_event_id = event.marketplace_event_id.as_deref().unwrap_or(""),
            handler = event.handler.as_str(),
            "webhook event handled"
        );
    }
}

/// Remembers the most recent marketplace event ids and reports repeats.
///
/// Memory is bounded: once `capacity` ids are held, the oldest is forgotten.
#[derive(Debug)]
pub struct IdempotencyGuard {
    capacity: usize,
    seen: HashSet<(Marketplace, String)>,
    order: VecDeque<(Marketplace, String)>,
}

impl IdempotencyGuard {
    /// Creates a guard remembering up to `capacity` ids. A capacity of `0`
    /// disables de-duplication.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Returns `true` the first time an id is seen within the window.
    pub fn first_seen(&mut self, marketplace: Marketplace, marketplace_event_id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        let key = (marketplace, marketplace_event_id.to_string());
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    /// Ids currently remembered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// `true` when nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Dispatcher backed by a bounded in-process queue.
#[derive(Debug, Clone)]
pub struct QueueDispatcher {
    tx: mpsc::Sender<ClassifiedEvent>,
    enqueue_timeout: Duration,
}

impl QueueDispatcher {
    /// Creates the queue and spawns its worker on the current runtime.
    ///
    /// The worker stops once every clone of the dispatcher is dropped and
    /// the queue has been drained.
    #[must_use]
    pub fn spawn(
        capacity: usize,
        enqueue_timeout: Duration,
        dedupe_window: usize,
        processor: Arc<dyn EventProcessor>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(rx, IdempotencyGuard::new(dedupe_window), processor));
        (
            Self {
                tx,
                enqueue_timeout,
            },
            worker,
        )
    }
}

#[async_trait]
impl EventDispatcher for QueueDispatcher {
    async fn dispatch(&self, event: ClassifiedEvent) -> Result<(), DispatchError> {
        self.tx
            .send_timeout(event, self.enqueue_timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(_) => DispatchError::QueueFull(self.enqueue_timeout),
                SendTimeoutError::Closed(_) => DispatchError::Closed,
            })
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<ClassifiedEvent>,
    mut guard: IdempotencyGuard,
    processor: Arc<dyn EventProcessor>,
) {
    while let Some(event) = rx.recv().await {
        if let Some(id) = event.marketplace_event_id.as_deref()
            && !guard.first_seen(event.marketplace, id)
        {
            tracing::debug!(
                marketplace = %event.marketplace,
                marketplace_event_id = id,
                "duplicate webhook event dropped"
            );
            continue;
        }
        processor.process(event).await;
    }
    tracing::debug!("dispatch worker stopped");
}
