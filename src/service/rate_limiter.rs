//! Multi-window rate limiter for outbound marketplace calls.
//!
//! Every marketplace owns one fixed counting window per enabled
//! [`Granularity`]. A call is admitted only when every window still has room,
//! and then all windows are incremented together. Roll-over, the capacity
//! check and the increment happen under one lock, so concurrent callers can
//! never push a window past its ceiling.
//!
//! The limiter fails closed: an unregistered marketplace or a poisoned lock
//! rejects the call instead of letting it through to the marketplace API.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{Marketplace, RateLimitWindow, RateLimits};

/// Outcome of one admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitResult {
    /// Whether the call may proceed.
    pub allowed: bool,
    /// Wait until the earliest saturated window resets. `None` when the
    /// call was admitted or the limiter failed closed.
    pub retry_after: Option<Duration>,
}

impl AdmitResult {
    const fn admitted() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    const fn rejected(retry_after: Option<Duration>) -> Self {
        Self {
            allowed: false,
            retry_after,
        }
    }
}

/// Errors raised by diagnostic reads. Admission itself never errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimiterError {
    /// No limits are registered for the marketplace.
    #[error("no rate limits registered for {0}")]
    UnknownMarketplace(Marketplace),

    /// Internal state is unusable.
    #[error("rate limiter state unavailable")]
    Unavailable,
}

/// Thread-safe fixed-window limiter shared by the gateway and the scheduler.
#[derive(Debug)]
pub struct RateLimiter {
    limits: HashMap<Marketplace, RateLimits>,
    windows: Mutex<HashMap<Marketplace, Vec<RateLimitWindow>>>,
}

impl RateLimiter {
    /// Creates a limiter for the given per-marketplace ceilings. Windows are
    /// opened lazily on the first call.
    #[must_use]
    pub fn new(limits: impl IntoIterator<Item = (Marketplace, RateLimits)>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Ceilings registered for `marketplace`.
    #[must_use]
    pub fn limits(&self, marketplace: Marketplace) -> Option<RateLimits> {
        self.limits.get(&marketplace).copied()
    }

    /// Attempts to admit one call for `marketplace` at `now`.
    ///
    /// On admission every window's count grows by one. On rejection nothing
    /// changes and `retry_after` is the shortest wait among the saturated
    /// windows.
    pub fn try_admit(&self, marketplace: Marketplace, now: DateTime<Utc>) -> AdmitResult {
        let Some(limits) = self.limits.get(&marketplace) else {
            tracing::error!(
                %marketplace,
                "rate limit check for unregistered marketplace; rejecting"
            );
            return AdmitResult::rejected(None);
        };

        let Ok(mut all) = self.windows.lock() else {
            tracing::error!(%marketplace, "rate limiter state poisoned; rejecting");
            return AdmitResult::rejected(None);
        };

        let windows = all
            .entry(marketplace)
            .or_insert_with(|| open_windows(marketplace, limits, now));

        for window in windows.iter_mut() {
            window.roll(now);
        }

        let retry_after = windows
            .iter()
            .filter(|w| !w.has_capacity())
            .map(|w| w.retry_after(now))
            .min();

        if let Some(wait) = retry_after {
            let wait = wait.to_std().unwrap_or(Duration::ZERO);
            tracing::debug!(
                %marketplace,
                retry_after_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit reached"
            );
            return AdmitResult::rejected(Some(wait));
        }

        for window in windows.iter_mut() {
            window.count = window.count.saturating_add(1);
        }
        AdmitResult::admitted()
    }

    /// Current windows for `marketplace` as seen at `now`, without mutating
    /// them. A marketplace that has not made a call yet reports empty windows.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimiterError`] for an unregistered marketplace or a
    /// poisoned lock.
    pub fn snapshot(
        &self,
        marketplace: Marketplace,
        now: DateTime<Utc>,
    ) -> Result<Vec<RateLimitWindow>, RateLimiterError> {
        let limits = self
            .limits
            .get(&marketplace)
            .ok_or(RateLimiterError::UnknownMarketplace(marketplace))?;
        let all = self.windows.lock().map_err(|_| RateLimiterError::Unavailable)?;

        Ok(match all.get(&marketplace) {
            Some(windows) => windows.iter().map(|w| w.rolled(now)).collect(),
            None => open_windows(marketplace, limits, now),
        })
    }
}

fn open_windows(
    marketplace: Marketplace,
    limits: &RateLimits,
    now: DateTime<Utc>,
) -> Vec<RateLimitWindow> {
    limits
        .ceilings()
        .into_iter()
        .map(|(granularity, ceiling)| RateLimitWindow::open(marketplace, granularity, ceiling, now))
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::TimeZone;

    use super::*;
    use crate::domain::Granularity;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        let Some(ts) = Utc.with_ymd_and_hms(2025, 6, 12, h, m, s).single() else {
            panic!("valid timestamp");
        };
        ts
    }

    fn limiter(per_minute: u32, per_hour: u32, per_day: u32) -> RateLimiter {
        RateLimiter::new([(
            Marketplace::Trendyol,
            RateLimits {
                per_minute,
                per_hour,
                per_day,
            },
        )])
    }

    #[test]
    fn admits_exactly_up_to_minute_ceiling() {
        let limiter = limiter(30, 1_000, 10_000);
        let now = at(10, 0, 15);

        for i in 0..30 {
            let result = limiter.try_admit(Marketplace::Trendyol, now);
            assert!(result.allowed, "call {i} should be admitted");
        }
        let rejected = limiter.try_admit(Marketplace::Trendyol, now);
        assert!(!rejected.allowed);
        assert_eq!(rejected.retry_after, Some(Duration::from_secs(45)));
    }

    #[test]
    fn next_window_admits_again() {
        let limiter = limiter(2, 0, 0);
        assert!(limiter.try_admit(Marketplace::Trendyol, at(10, 0, 1)).allowed);
        assert!(limiter.try_admit(Marketplace::Trendyol, at(10, 0, 2)).allowed);
        assert!(!limiter.try_admit(Marketplace::Trendyol, at(10, 0, 59)).allowed);
        assert!(limiter.try_admit(Marketplace::Trendyol, at(10, 1, 0)).allowed);
    }

    #[test]
    fn rejection_does_not_increment_any_window() {
        let limiter = limiter(100, 2, 0);
        let now = at(10, 0, 0);
        assert!(limiter.try_admit(Marketplace::Trendyol, now).allowed);
        assert!(limiter.try_admit(Marketplace::Trendyol, now).allowed);
        assert!(!limiter.try_admit(Marketplace::Trendyol, now).allowed);

        let Ok(windows) = limiter.snapshot(Marketplace::Trendyol, now) else {
            panic!("snapshot failed");
        };
        for window in windows {
            assert_eq!(window.count, 2, "{} window over-counted", window.granularity);
        }
    }

    #[test]
    fn retry_after_is_shortest_saturated_window() {
        let limiter = limiter(1, 1, 0);
        let now = at(10, 30, 20);
        assert!(limiter.try_admit(Marketplace::Trendyol, now).allowed);

        let rejected = limiter.try_admit(Marketplace::Trendyol, now);
        assert_eq!(rejected.retry_after, Some(Duration::from_secs(40)));

        // Minute window reset, hour window still saturated.
        let later = limiter.try_admit(Marketplace::Trendyol, at(10, 31, 0));
        assert!(!later.allowed);
        assert_eq!(later.retry_after, Some(Duration::from_secs(29 * 60)));
    }

    #[test]
    fn unregistered_marketplace_fails_closed() {
        let limiter = limiter(30, 0, 0);
        let result = limiter.try_admit(Marketplace::Allegro, at(10, 0, 0));
        assert!(!result.allowed);
        assert_eq!(result.retry_after, None);
        assert_eq!(
            limiter.snapshot(Marketplace::Allegro, at(10, 0, 0)),
            Err(RateLimiterError::UnknownMarketplace(Marketplace::Allegro))
        );
    }

    #[test]
    fn poisoned_state_fails_closed() {
        let limiter = Arc::new(limiter(30, 0, 0));
        let poisoner = Arc::clone(&limiter);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.windows.lock();
            panic!("poison the limiter");
        })
        .join();

        let result = limiter.try_admit(Marketplace::Trendyol, at(10, 0, 0));
        assert!(!result.allowed);
        assert_eq!(
            limiter.snapshot(Marketplace::Trendyol, at(10, 0, 0)),
            Err(RateLimiterError::Unavailable)
        );
    }

    #[test]
    fn disabled_granularities_are_not_tracked() {
        let limiter = limiter(0, 0, 0);
        for _ in 0..500 {
            assert!(limiter.try_admit(Marketplace::Trendyol, at(10, 0, 0)).allowed);
        }
        let Ok(windows) = limiter.snapshot(Marketplace::Trendyol, at(10, 0, 0)) else {
            panic!("snapshot failed");
        };
        assert!(windows.is_empty());
    }

    #[test]
    fn snapshot_reports_rolled_windows() {
        let limiter = limiter(5, 50, 0);
        assert!(limiter.try_admit(Marketplace::Trendyol, at(10, 0, 0)).allowed);

        let Ok(windows) = limiter.snapshot(Marketplace::Trendyol, at(10, 2, 0)) else {
            panic!("snapshot failed");
        };
        let Some(minute) = windows.iter().find(|w| w.granularity == Granularity::Minute) else {
            panic!("minute window missing");
        };
        assert_eq!(minute.count, 0);
        let Some(hour) = windows.iter().find(|w| w.granularity == Granularity::Hour) else {
            panic!("hour window missing");
        };
        assert_eq!(hour.count, 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_ceiling() {
        let limiter = Arc::new(limiter(30, 0, 0));
        let admitted = Arc::new(AtomicU32::new(0));
        let now = at(10, 0, 0);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        if limiter.try_admit(Marketplace::Trendyol, now).allowed {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            let _ = handle.join();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 30);
    }
}
