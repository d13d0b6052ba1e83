//! Tier status and rate window DTOs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Granularity, Marketplace, Priority, RateLimitWindow, SyncTier, TierState};

/// One tier as shown on the dashboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TierStatusDto {
    /// Marketplace.
    pub marketplace: Marketplace,
    /// Priority class.
    pub priority: Priority,
    /// `idle`, `due` or `dispatched`.
    pub state: TierState,
    /// Minimum seconds between runs.
    pub interval_secs: u64,
    /// Items processed per run.
    pub item_budget: usize,
    /// Start of the last counted run.
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the tier becomes due; `None` if it has never run.
    pub next_due_at: Option<DateTime<Utc>>,
}

impl TierStatusDto {
    /// Builds the view of `tier` at `now`.
    #[must_use]
    pub fn from_tier(tier: &SyncTier, now: DateTime<Utc>) -> Self {
        Self {
            marketplace: tier.marketplace,
            priority: tier.priority,
            state: tier.state(now),
            interval_secs: tier.interval.as_secs(),
            item_budget: tier.item_budget,
            last_run_at: tier.last_run_at,
            next_due_at: tier.next_due_at(),
        }
    }
}

/// Response body for `GET /api/v1/sync/tiers`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TierListResponse {
    /// Every configured tier.
    pub data: Vec<TierStatusDto>,
}

/// One rate window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RateWindowDto {
    /// Window width.
    pub granularity: Granularity,
    /// Start of the current window.
    pub window_start: DateTime<Utc>,
    /// Calls admitted so far.
    pub count: u32,
    /// Calls allowed per window.
    pub ceiling: u32,
    /// When the window resets.
    pub resets_at: DateTime<Utc>,
}

impl From<RateLimitWindow> for RateWindowDto {
    fn from(window: RateLimitWindow) -> Self {
        Self {
            granularity: window.granularity,
            window_start: window.window_start,
            count: window.count,
            ceiling: window.ceiling,
            resets_at: window.resets_at(),
        }
    }
}

/// Response body for `GET /api/v1/rate-limits/{marketplace}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RateLimitSnapshotResponse {
    /// Marketplace.
    pub marketplace: Marketplace,
    /// Enabled windows; empty when every ceiling is disabled.
    pub windows: Vec<RateWindowDto>,
}
