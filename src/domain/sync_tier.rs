//! Priority classes and their scheduling state.
//!
//! A [`SyncTier`] pairs a marketplace with a [`Priority`] and remembers when
//! it last ran. The tier is due once `last_run_at + interval` has passed and
//! no run of it is still in flight.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Marketplace;

/// Priority class of a sync tier. Ordered `High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Bulk catalogue work.
    Low,
    /// Routine refreshes.
    Medium,
    /// Orders and stock; must never wait behind lower tiers.
    High,
}

impl Priority {
    /// All priorities, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Medium, Self::Low];

    /// Lower-case name used in URLs and config keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("unknown priority: {needle}"))
    }
}

/// Static configuration of one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    /// Priority class.
    pub priority: Priority,
    /// Minimum time between two runs.
    pub interval: Duration,
    /// Maximum items processed per run.
    pub item_budget: usize,
}

/// Scheduling state as seen by dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TierState {
    /// Waiting for its interval to elapse.
    Idle,
    /// Interval elapsed; will be dispatched at the next tick.
    Due,
    /// A run is in flight.
    Dispatched,
}

/// Runtime state of one (marketplace, priority) tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTier {
    /// Marketplace this tier synchronizes.
    pub marketplace: Marketplace,
    /// Priority class.
    pub priority: Priority,
    /// Minimum time between runs.
    pub interval: Duration,
    /// Items processed per run.
    pub item_budget: usize,
    /// Dispatch time of the last counted run; `None` before the first run.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Whether a run is currently executing.
    pub in_flight: bool,
}

impl SyncTier {
    /// Creates an idle tier that has never run.
    #[must_use]
    pub const fn new(marketplace: Marketplace, config: TierConfig) -> Self {
        Self {
            marketplace,
            priority: config.priority,
            interval: config.interval,
            item_budget: config.item_budget,
            last_run_at: None,
            in_flight: false,
        }
    }

    /// `last_run_at + interval`; `None` when the tier has never run.
    #[must_use]
    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        let last = self.last_run_at?;
        let interval = TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::MAX);
        Some(
            last.checked_add_signed(interval)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    /// `true` iff no run is in flight and `now >= next_due_at`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.in_flight && self.next_due_at().is_none_or(|due| now >= due)
    }

    /// Current state at `now`.
    #[must_use]
    pub fn state(&self, now: DateTime<Utc>) -> TierState {
        if self.in_flight {
            TierState::Dispatched
        } else if self.is_due(now) {
            TierState::Due
        } else {
            TierState::Idle
        }
    }

    /// Marks the tier dispatched at `now` and returns the previous
    /// `last_run_at`, which is needed to undo a rate-limited attempt.
    pub fn mark_dispatched(&mut self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.in_flight = true;
        self.last_run_at.replace(now)
    }

    /// Returns the tier to idle after a run.
    ///
    /// A run that never reached the marketplace because of rate limiting
    /// does not count: `last_run_at` is restored so the tier is due again at
    /// the next tick.
    pub fn complete(&mut self, rate_limited: bool, previous_run: Option<DateTime<Utc>>) {
        self.in_flight = false;
        if rate_limited {
            self.last_run_at = previous_run;
        }
    }
}
