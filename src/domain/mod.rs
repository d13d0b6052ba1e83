//! Domain layer: marketplace identity, webhook events, rate windows, sync
//! tiers and jobs, and Outcome Log records.
//!
//! Everything here is plain data with local invariants. Components in
//! [`crate::service`] own the state transitions.

pub mod marketplace;
pub mod outcome;
pub mod rate_window;
pub mod sync_job;
pub mod sync_tier;
pub mod webhook_event;

pub use marketplace::{Marketplace, UnknownMarketplace};
pub use outcome::{
    OutcomeEntry, OutcomeKind, OutcomeQuery, OutcomeRecord, WebhookDisposition, WebhookOutcome,
};
pub use rate_window::{Granularity, RateLimitWindow, RateLimits};
pub use sync_job::{ErrorSample, FailureReason, JobStatus, SyncJob};
pub use sync_tier::{Priority, SyncTier, TierConfig, TierState};
pub use webhook_event::{ClassifiedEvent, HandlerId, InspectedPayload, WebhookEvent};
