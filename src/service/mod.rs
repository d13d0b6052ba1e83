//! Service layer: the gateway's core components.
//!
//! Inbound: [`WebhookGateway`] verifies deliveries with the
//! [`signature_verifier`], routes them through the [`EventClassifier`] and
//! hands them to an [`EventDispatcher`]. Outbound: [`SyncScheduler`] picks
//! due tiers and runs them through the [`JobExecutor`], which checks the
//! [`RateLimiter`] before calling a [`MarketplaceSync`] capability.

pub mod dispatcher;
pub mod event_classifier;
pub mod job_executor;
pub mod marketplace_sync;
pub mod rate_limiter;
pub mod signature_verifier;
pub mod sync_scheduler;
pub mod webhook_gateway;

pub use dispatcher::{
    DispatchError, EventDispatcher, EventProcessor, IdempotencyGuard, LoggingProcessor,
    QueueDispatcher,
};
pub use event_classifier::{Classification, EventClassifier};
pub use job_executor::{ExecutorConfig, JobExecutor, SyncRequest};
pub use marketplace_sync::{
    CapabilityError, ItemError, MarketplaceSync, SyncReport, UnconfiguredSync,
};
pub use rate_limiter::{AdmitResult, RateLimiter, RateLimiterError};
pub use signature_verifier::{SignatureAlgorithm, WebhookSecret};
pub use sync_scheduler::{DispatchPlan, SyncScheduler, TriggerError};
pub use webhook_gateway::{
    MarketplaceNotConfigured, WebhookDescriptor, WebhookGateway, WebhookReceipt,
};
