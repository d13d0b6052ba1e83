//! Fixed counting windows for outbound marketplace calls.
//!
//! Each marketplace has one [`RateLimitWindow`] per configured
//! [`Granularity`]. Windows are aligned to UTC epoch multiples of their
//! duration, so a minute window always starts at second `:00` and a day
//! window at midnight UTC.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Marketplace;

/// Width of a counting window.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// 60 seconds.
    Minute,
    /// 3 600 seconds.
    Hour,
    /// 86 400 seconds.
    Day,
}

impl Granularity {
    /// Window width in whole seconds.
    #[must_use]
    pub const fn seconds(self) -> i64 {
        match self {
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    /// Window width as a [`TimeDelta`].
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        TimeDelta::seconds(self.seconds())
    }

    /// Start of the window that contains `now`.
    #[must_use]
    pub fn window_start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        let secs = now.timestamp();
        let aligned = secs - secs.rem_euclid(self.seconds());
        DateTime::from_timestamp(aligned, 0).unwrap_or(now)
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        };
        f.write_str(name)
    }
}

/// Per-marketplace call ceilings. A ceiling of `0` disables that granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RateLimits {
    /// Calls allowed per minute window.
    pub per_minute: u32,
    /// Calls allowed per hour window.
    pub per_hour: u32,
    /// Calls allowed per day window.
    pub per_day: u32,
}

impl RateLimits {
    /// Returns the enabled `(granularity, ceiling)` pairs.
    #[must_use]
    pub fn ceilings(&self) -> Vec<(Granularity, u32)> {
        [
            (Granularity::Minute, self.per_minute),
            (Granularity::Hour, self.per_hour),
            (Granularity::Day, self.per_day),
        ]
        .into_iter()
        .filter(|(_, ceiling)| *ceiling > 0)
        .collect()
    }
}

/// One fixed counting window for one marketplace and granularity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RateLimitWindow {
    /// Marketplace the window counts calls for.
    pub marketplace: Marketplace,
    /// Window width.
    pub granularity: Granularity,
    /// Inclusive start of the current window.
    pub window_start: DateTime<Utc>,
    /// Calls admitted in the current window.
    pub count: u32,
    /// Maximum calls admitted per window.
    pub ceiling: u32,
}

impl RateLimitWindow {
    /// Opens an empty window containing `now`.
    #[must_use]
    pub fn open(
        marketplace: Marketplace,
        granularity: Granularity,
        ceiling: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            marketplace,
            granularity,
            window_start: granularity.window_start(now),
            count: 0,
            ceiling,
        }
    }

    /// Exclusive end of the current window.
    #[must_use]
    pub fn resets_at(&self) -> DateTime<Utc> {
        self.window_start + self.granularity.duration()
    }

    /// Moves the window forward if `now` lies past its end. Windows never
    /// move backwards, even if the clock does.
    pub fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.resets_at() {
            self.window_start = self.granularity.window_start(now);
            self.count = 0;
        }
    }

    /// Returns the window as it would look at `now`, without mutating it.
    #[must_use]
    pub fn rolled(&self, now: DateTime<Utc>) -> Self {
        let mut window = self.clone();
        window.roll(now);
        window
    }

    /// `true` if another call fits in the window.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.count < self.ceiling
    }

    /// Time from `now` until this window resets.
    #[must_use]
    pub fn retry_after(&self, now: DateTime<Utc>) -> TimeDelta {
        (self.resets_at() - now).max(TimeDelta::zero())
    }
}
