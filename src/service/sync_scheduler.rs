//! Priority-tiered synchronization scheduler.
//!
//! The scheduler owns every [`SyncTier`] and is the only component that
//! changes tier state. Each tick walks the tiers in global priority order:
//! every due High tier across all marketplaces is dispatched before any
//! Medium tier, and Medium before Low. Each marketplace has its own small
//! pool of worker slots, so a slow marketplace only delays its own tiers.
//!
//! A tier is marked dispatched, and its `last_run_at` stamped, before its
//! job starts. It cannot be dispatched again until that job has finished.
//! A run refused by the rate limiter gives its `last_run_at` back, so the
//! tier is due again at the next tick.
//!
//! Runs execute on their own Tokio tasks. A caller that stops waiting does
//! not stop the run, and a run whose task panics is recorded as aborted.
//! Either way the tier is released, keeping its `last_run_at`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::JoinSet;

use super::job_executor::{JobExecutor, SyncRequest};
use crate::domain::{FailureReason, Marketplace, Priority, SyncJob, SyncTier};

type SharedTiers = Arc<Mutex<Vec<SyncTier>>>;

fn lock_tiers(tiers: &Mutex<Vec<SyncTier>>) -> MutexGuard<'_, Vec<SyncTier>> {
    tiers.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A due tier chosen by [`SyncScheduler::tick`], holding its worker slot.
///
/// Dropping a plan returns its tier to idle, so a run that never reports
/// back cannot leave the tier dispatched.
#[derive(Debug)]
pub struct DispatchPlan {
    /// What to run.
    pub request: SyncRequest,
    release: TierRelease,
    _slot: OwnedSemaphorePermit,
}

impl DispatchPlan {
    /// Releases the tier. A rate-limited run gives back its `last_run_at`.
    fn complete(mut self, rate_limited: bool) {
        self.release.rate_limited = rate_limited;
    }
}

#[derive(Debug)]
struct TierRelease {
    tiers: SharedTiers,
    marketplace: Marketplace,
    priority: Priority,
    previous_run: Option<DateTime<Utc>>,
    rate_limited: bool,
}

impl Drop for TierRelease {
    fn drop(&mut self) {
        let mut tiers = lock_tiers(&self.tiers);
        if let Some(tier) = tiers
            .iter_mut()
            .find(|t| t.marketplace == self.marketplace && t.priority == self.priority)
        {
            tier.complete(self.rate_limited, self.previous_run);
        }
    }
}

/// Why a manual run was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    /// No tier is configured for this marketplace and priority.
    #[error("no {priority} tier configured for {marketplace}")]
    NotConfigured {
        /// Requested marketplace.
        marketplace: Marketplace,
        /// Requested priority.
        priority: Priority,
    },

    /// The tier, or another tier of the marketplace, is already running.
    #[error("{priority} tier of {marketplace} is busy")]
    Busy {
        /// Requested marketplace.
        marketplace: Marketplace,
        /// Requested priority.
        priority: Priority,
    },

    /// The rate limiter refused the run.
    #[error("rate limited")]
    RateLimited {
        /// Milliseconds until the limiter admits calls again.
        retry_after_ms: Option<u64>,
    },
}

/// Drives tier runs from a fixed-cadence timer.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    tiers: SharedTiers,
    slots: Arc<HashMap<Marketplace, Arc<Semaphore>>>,
    executor: JobExecutor,
    tick_interval: Duration,
}

impl SyncScheduler {
    /// Creates a scheduler over `tiers` with `worker_slots` concurrent runs
    /// per marketplace.
    #[must_use]
    pub fn new(
        tiers: Vec<SyncTier>,
        worker_slots: usize,
        executor: JobExecutor,
        tick_interval: Duration,
    ) -> Self {
        let slots = tiers
            .iter()
            .map(|t| (t.marketplace, Arc::new(Semaphore::new(worker_slots.max(1)))))
            .collect();
        Self {
            tiers: Arc::new(Mutex::new(tiers)),
            slots: Arc::new(slots),
            executor,
            tick_interval,
        }
    }

    /// Snapshot of all tiers, in configuration order.
    pub async fn tiers(&self) -> Vec<SyncTier> {
        lock_tiers(&self.tiers).clone()
    }

    /// Selects due tiers at `now`, highest priority first, and marks them
    /// dispatched. A due tier whose marketplace has no free worker slot is
    /// left due for the next tick.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<DispatchPlan> {
        let mut tiers = lock_tiers(&self.tiers);
        let mut plans = Vec::new();

        for priority in Priority::ALL {
            for tier in tiers
                .iter_mut()
                .filter(|t| t.priority == priority && t.is_due(now))
            {
                let Some(slot) = self.try_slot(tier.marketplace) else {
                    tracing::debug!(
                        marketplace = %tier.marketplace,
                        priority = %tier.priority,
                        "tier due but no worker slot free"
                    );
                    continue;
                };
                plans.push(self.dispatch(tier, now, slot));
            }
        }
        plans
    }

    /// Executes a plan and returns its tier to idle. The worker slot is
    /// released when this returns.
    ///
    /// The job itself runs on a separate task; if that task panics, an
    /// aborted job is recorded in its place.
    pub async fn run_plan(&self, plan: DispatchPlan) -> SyncJob {
        let request = plan.request;
        let executor = self.executor.clone();
        let job = match tokio::spawn(async move { executor.execute(&request).await }).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(
                    marketplace = %request.marketplace,
                    priority = %request.priority,
                    error = %e,
                    "sync job task aborted"
                );
                self.executor.record_aborted(&request, e.to_string()).await
            }
        };
        plan.complete(job.is_rate_limited());
        job
    }

    /// Runs one tier immediately, outside the timer.
    ///
    /// The run continues to completion even if the returned future is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TriggerError`] if the tier does not exist, is busy, or the
    /// rate limiter refused the run. A refused run is still recorded.
    pub async fn trigger(
        &self,
        marketplace: Marketplace,
        priority: Priority,
    ) -> Result<SyncJob, TriggerError> {
        let now = Utc::now();
        let plan = {
            let mut tiers = lock_tiers(&self.tiers);
            let tier = tiers
                .iter_mut()
                .find(|t| t.marketplace == marketplace && t.priority == priority)
                .ok_or(TriggerError::NotConfigured {
                    marketplace,
                    priority,
                })?;
            if tier.in_flight {
                return Err(TriggerError::Busy {
                    marketplace,
                    priority,
                });
            }
            let slot = self.try_slot(marketplace).ok_or(TriggerError::Busy {
                marketplace,
                priority,
            })?;
            self.dispatch(tier, now, slot)
        };

        tracing::info!(%marketplace, %priority, "manual sync triggered");
        let request = plan.request;
        let scheduler = self.clone();
        let job = match tokio::spawn(async move { scheduler.run_plan(plan).await }).await {
            Ok(job) => job,
            Err(e) => self.executor.record_aborted(&request, e.to_string()).await,
        };
        if job.is_rate_limited() {
            let retry_after_ms = match job.failure_reason {
                Some(FailureReason::RateLimited { retry_after_ms }) => retry_after_ms,
                _ => None,
            };
            return Err(TriggerError::RateLimited { retry_after_ms });
        }
        Ok(job)
    }

    /// Ticks every `tick_interval` until `shutdown` flips to `true` or its
    /// sender is dropped. Jobs are spawned off the timer task; jobs still
    /// running at shutdown are awaited before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut running = JoinSet::new();

        tracing::info!(
            tick_ms = u64::try_from(self.tick_interval.as_millis()).unwrap_or(u64::MAX),
            "sync scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    while running.try_join_next().is_some() {}
                    for plan in self.tick(Utc::now()).await {
                        let scheduler = self.clone();
                        running.spawn(async move {
                            let _ = scheduler.run_plan(plan).await;
                        });
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(in_flight = running.len(), "sync scheduler stopping");
        while running.join_next().await.is_some() {}
    }

    fn dispatch(
        &self,
        tier: &mut SyncTier,
        now: DateTime<Utc>,
        slot: OwnedSemaphorePermit,
    ) -> DispatchPlan {
        let previous_run = tier.mark_dispatched(now);
        DispatchPlan {
            request: SyncRequest {
                marketplace: tier.marketplace,
                priority: tier.priority,
                item_budget: tier.item_budget,
                started_at: now,
            },
            release: TierRelease {
                tiers: Arc::clone(&self.tiers),
                marketplace: tier.marketplace,
                priority: tier.priority,
                previous_run,
                rate_limited: false,
            },
            _slot: slot,
        }
    }

    fn try_slot(&self, marketplace: Marketplace) -> Option<OwnedSemaphorePermit> {
        self.slots
            .get(&marketplace)
            .and_then(|s| Arc::clone(s).try_acquire_owned().ok())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};

    use super::*;
    use crate::domain::{
        JobStatus, OutcomeEntry, OutcomeQuery, OutcomeRecord, RateLimits, TierConfig, TierState,
    };
    use crate::persistence::{InMemoryOutcomeLog, OutcomeLog};
    use crate::service::job_executor::ExecutorConfig;
    use crate::service::marketplace_sync::{
        CapabilityError, ItemError, MarketplaceSync, SyncReport,
    };
    use crate::service::rate_limiter::RateLimiter;

    #[derive(Debug, Default)]
    struct Counting {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MarketplaceSync for Counting {
        async fn sync(
            &self,
            _marketplace: Marketplace,
            _priority: Priority,
            item_budget: usize,
        ) -> Result<SyncReport, CapabilityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = u64::try_from(item_budget).unwrap_or(0);
            Ok(SyncReport {
                attempted: n,
                succeeded: n,
                errors: Vec::new(),
            })
        }

        async fn retry_item(
            &self,
            _marketplace: Marketplace,
            _priority: Priority,
            item_id: &str,
        ) -> Result<(), ItemError> {
            Err(ItemError::permanent(item_id, "not expected"))
        }
    }

    /// Completes every run after a fixed delay.
    #[derive(Debug)]
    struct Slow(Duration);

    #[async_trait]
    impl MarketplaceSync for Slow {
        async fn sync(
            &self,
            _marketplace: Marketplace,
            _priority: Priority,
            _item_budget: usize,
        ) -> Result<SyncReport, CapabilityError> {
            tokio::time::sleep(self.0).await;
            Ok(SyncReport {
                attempted: 1,
                succeeded: 1,
                errors: Vec::new(),
            })
        }

        async fn retry_item(
            &self,
            _marketplace: Marketplace,
            _priority: Priority,
            item_id: &str,
        ) -> Result<(), ItemError> {
            Err(ItemError::permanent(item_id, "not expected"))
        }
    }

    #[derive(Debug)]
    struct Crashing;

    #[async_trait]
    impl MarketplaceSync for Crashing {
        async fn sync(
            &self,
            _marketplace: Marketplace,
            _priority: Priority,
            item_budget: usize,
        ) -> Result<SyncReport, CapabilityError> {
            if item_budget > 0 {
                panic!("marketplace client crashed");
            }
            Ok(SyncReport::default())
        }

        async fn retry_item(
            &self,
            _marketplace: Marketplace,
            _priority: Priority,
            item_id: &str,
        ) -> Result<(), ItemError> {
            Err(ItemError::permanent(item_id, "not expected"))
        }
    }

    fn at(m: u32) -> DateTime<Utc> {
        let Some(ts) = Utc.with_ymd_and_hms(2025, 6, 12, 10, m, 0).single() else {
            panic!("valid timestamp");
        };
        ts
    }

    fn tier(marketplace: Marketplace, priority: Priority, interval_secs: u64) -> SyncTier {
        SyncTier::new(
            marketplace,
            TierConfig {
                priority,
                interval: Duration::from_secs(interval_secs),
                item_budget: 10,
            },
        )
    }

    fn limits(per_minute: u32) -> RateLimits {
        RateLimits {
            per_minute,
            per_hour: 0,
            per_day: 0,
        }
    }

    fn scheduler(
        tiers: Vec<SyncTier>,
        limiter: RateLimiter,
        log: Arc<InMemoryOutcomeLog>,
    ) -> SyncScheduler {
        scheduler_with(tiers, limiter, log, Arc::new(Counting::default()))
    }

    fn scheduler_with(
        tiers: Vec<SyncTier>,
        limiter: RateLimiter,
        log: Arc<InMemoryOutcomeLog>,
        capability: Arc<dyn MarketplaceSync>,
    ) -> SyncScheduler {
        let executor = JobExecutor::new(
            Arc::new(limiter),
            capability,
            log,
            ExecutorConfig {
                max_duration: Duration::from_secs(5),
                item_max_retries: 0,
            },
        );
        SyncScheduler::new(tiers, 1, executor, Duration::from_millis(10))
    }

    fn open_limiter(marketplaces: &[Marketplace]) -> RateLimiter {
        RateLimiter::new(marketplaces.iter().map(|m| (*m, limits(1_000))))
    }

    /// Waits until a job is logged and no tier is in flight.
    async fn settled(
        s: &SyncScheduler,
        log: &InMemoryOutcomeLog,
    ) -> (Vec<OutcomeEntry>, SyncTier) {
        for _ in 0..200 {
            let Ok(entries) = log.query(&OutcomeQuery::default()).await else {
                panic!("query failed");
            };
            let tiers = s.tiers().await;
            if let Some(t) = tiers.into_iter().next()
                && !entries.is_empty()
                && !t.in_flight
            {
                return (entries, t);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run never settled");
    }

    fn logged_job(entries: &[OutcomeEntry]) -> &SyncJob {
        let Some(OutcomeEntry {
            record: OutcomeRecord::Job(job),
            ..
        }) = entries.first()
        else {
            panic!("expected a logged job");
        };
        job
    }

    #[tokio::test]
    async fn high_tier_runs_once_per_interval() {
        let log = Arc::new(InMemoryOutcomeLog::new(100));
        let s = scheduler(
            vec![tier(Marketplace::Trendyol, Priority::High, 300)],
            open_limiter(&[Marketplace::Trendyol]),
            Arc::clone(&log),
        );

        let mut dispatched = 0;
        for minute in [0, 2, 6] {
            for plan in s.tick(at(minute)).await {
                let _ = s.run_plan(plan).await;
                dispatched += 1;
            }
            if minute == 2 {
                assert_eq!(dispatched, 1, "tick at minute 2 must not dispatch");
            }
        }
        assert_eq!(dispatched, 2);
    }

    #[tokio::test]
    async fn dispatched_tier_is_not_dispatched_again() {
        let s = scheduler(
            vec![tier(Marketplace::Ozon, Priority::High, 60)],
            open_limiter(&[Marketplace::Ozon]),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let first = s.tick(at(0)).await;
        assert_eq!(first.len(), 1);

        // Job still running: later ticks must not re-enter the tier.
        assert!(s.tick(at(5)).await.is_empty());
        assert!(s.tick(at(30)).await.is_empty());

        for plan in first {
            let _ = s.run_plan(plan).await;
        }
        assert_eq!(s.tick(at(31)).await.len(), 1);
    }

    #[tokio::test]
    async fn high_tiers_dispatch_before_low_tiers() {
        let s = scheduler(
            vec![
                tier(Marketplace::Allegro, Priority::Low, 60),
                tier(Marketplace::N11, Priority::Medium, 60),
                tier(Marketplace::Amazon, Priority::High, 60),
            ],
            open_limiter(&[Marketplace::Allegro, Marketplace::N11, Marketplace::Amazon]),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let plans = s.tick(at(0)).await;
        let order: Vec<Priority> = plans.iter().map(|p| p.request.priority).collect();
        assert_eq!(order, vec![Priority::High, Priority::Medium, Priority::Low]);

        let mut jobs = Vec::new();
        for plan in plans {
            jobs.push(s.run_plan(plan).await);
        }
        let (Some(high), Some(low)) = (jobs.first(), jobs.last()) else {
            panic!("missing jobs");
        };
        assert!(high.started_at <= low.started_at);
    }

    #[tokio::test]
    async fn busy_marketplace_keeps_lower_tier_due() {
        let s = scheduler(
            vec![
                tier(Marketplace::Trendyol, Priority::Low, 60),
                tier(Marketplace::Trendyol, Priority::High, 60),
            ],
            open_limiter(&[Marketplace::Trendyol]),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );

        let plans = s.tick(at(0)).await;
        assert_eq!(plans.len(), 1);
        let Some(plan) = plans.into_iter().next() else {
            panic!("missing plan");
        };
        assert_eq!(plan.request.priority, Priority::High);

        let states: Vec<TierState> = s.tiers().await.iter().map(|t| t.state(at(0))).collect();
        assert_eq!(states, vec![TierState::Due, TierState::Dispatched]);

        let _ = s.run_plan(plan).await;
        let next = s.tick(at(0)).await;
        let priorities: Vec<Priority> = next.iter().map(|p| p.request.priority).collect();
        assert_eq!(priorities, vec![Priority::Low]);
    }

    #[tokio::test]
    async fn rate_limited_run_is_due_at_next_tick() {
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let limiter = RateLimiter::new([(Marketplace::Ebay, limits(1))]);
        assert!(limiter.try_admit(Marketplace::Ebay, Utc::now()).allowed);
        let s = scheduler(
            vec![tier(Marketplace::Ebay, Priority::High, 300)],
            limiter,
            Arc::clone(&log),
        );

        let mut jobs = Vec::new();
        for plan in s.tick(at(0)).await {
            jobs.push(s.run_plan(plan).await);
        }
        let Some(job) = jobs.first() else {
            panic!("tier should have been dispatched");
        };
        assert!(job.is_rate_limited());

        let tiers = s.tiers().await;
        let Some(t) = tiers.first() else {
            panic!("missing tier");
        };
        assert_eq!(t.last_run_at, None);
        assert!(t.is_due(at(0)));
    }

    #[tokio::test]
    async fn trigger_runs_and_rejects_busy_or_unknown_tiers() {
        let s = scheduler(
            vec![tier(Marketplace::Pazarama, Priority::Medium, 600)],
            open_limiter(&[Marketplace::Pazarama]),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );

        let Ok(job) = s.trigger(Marketplace::Pazarama, Priority::Medium).await else {
            panic!("manual run failed");
        };
        assert_eq!(job.status, JobStatus::Succeeded);

        assert_eq!(
            s.trigger(Marketplace::Pazarama, Priority::High).await,
            Err(TriggerError::NotConfigured {
                marketplace: Marketplace::Pazarama,
                priority: Priority::High,
            })
        );

        let plans = s.tick(at(0)).await;
        assert!(plans.is_empty(), "manual run counts as the last run");
    }

    #[tokio::test]
    async fn trigger_refuses_in_flight_tier() {
        let s = scheduler(
            vec![tier(Marketplace::Tokopedia, Priority::High, 60)],
            open_limiter(&[Marketplace::Tokopedia]),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let _plans = s.tick(at(0)).await;
        assert_eq!(
            s.trigger(Marketplace::Tokopedia, Priority::High).await,
            Err(TriggerError::Busy {
                marketplace: Marketplace::Tokopedia,
                priority: Priority::High,
            })
        );
    }

    #[tokio::test]
    async fn trigger_reports_rate_limit() {
        let limiter = RateLimiter::new([(Marketplace::Ozon, limits(1))]);
        assert!(limiter.try_admit(Marketplace::Ozon, Utc::now()).allowed);
        let s = scheduler(
            vec![tier(Marketplace::Ozon, Priority::High, 60)],
            limiter,
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let Err(TriggerError::RateLimited { retry_after_ms }) =
            s.trigger(Marketplace::Ozon, Priority::High).await
        else {
            panic!("expected rate limiting");
        };
        assert!(retry_after_ms.is_some_and(|ms| ms <= 60_000));
    }

    #[tokio::test]
    async fn run_loop_dispatches_and_stops_on_shutdown() {
        let log = Arc::new(InMemoryOutcomeLog::new(100));
        let s = scheduler(
            vec![tier(Marketplace::Hepsiburada, Priority::High, 3_600)],
            open_limiter(&[Marketplace::Hepsiburada]),
            Arc::clone(&log),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(s.run(rx));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = tx.send(true);
        let Ok(joined) = tokio::time::timeout(Duration::from_secs(2), handle).await else {
            panic!("scheduler did not stop");
        };
        assert!(joined.is_ok());

        let Ok(entries) = log.query(&OutcomeQuery::default()).await else {
            panic!("query failed");
        };
        assert_eq!(entries.len(), 1, "hourly tier runs once");
    }

    #[tokio::test]
    async fn abandoned_trigger_still_finishes_the_run() {
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let s = scheduler_with(
            vec![tier(Marketplace::Ozon, Priority::High, 3_600)],
            open_limiter(&[Marketplace::Ozon]),
            Arc::clone(&log),
            Arc::new(Slow(Duration::from_millis(300))),
        );

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            s.trigger(Marketplace::Ozon, Priority::High),
        )
        .await;
        assert!(abandoned.is_err(), "run should outlive the caller");

        let (entries, t) = settled(&s, &log).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(logged_job(&entries).status, JobStatus::Succeeded);

        let Some(last) = t.last_run_at else {
            panic!("run should count as the last run");
        };
        assert!(!t.is_due(last + TimeDelta::minutes(59)));
        assert_eq!(s.tick(last + TimeDelta::hours(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn crashed_run_is_logged_and_releases_tier() {
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let s = scheduler_with(
            vec![tier(Marketplace::Allegro, Priority::High, 3_600)],
            open_limiter(&[Marketplace::Allegro]),
            Arc::clone(&log),
            Arc::new(Crashing),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(s.clone().run(rx));

        let (entries, t) = settled(&s, &log).await;
        let _ = tx.send(true);
        let Ok(joined) = tokio::time::timeout(Duration::from_secs(2), handle).await else {
            panic!("scheduler did not stop");
        };
        assert!(joined.is_ok(), "a crashed run must not take the loop down");

        assert_eq!(entries.len(), 1);
        let job = logged_job(&entries);
        assert_eq!(job.status, JobStatus::Failed);
        assert!(matches!(job.failure_reason, Some(FailureReason::Aborted { .. })));

        let Some(last) = t.last_run_at else {
            panic!("crashed run should count as the last run");
        };
        assert!(!t.is_due(last + TimeDelta::minutes(59)));
        assert_eq!(s.tick(last + TimeDelta::hours(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn trigger_reports_crashed_run_as_aborted() {
        let s = scheduler_with(
            vec![tier(Marketplace::N11, Priority::Low, 600)],
            open_limiter(&[Marketplace::N11]),
            Arc::new(InMemoryOutcomeLog::new(10)),
            Arc::new(Crashing),
        );

        let Ok(job) = s.trigger(Marketplace::N11, Priority::Low).await else {
            panic!("crashed run should still produce a job");
        };
        assert!(matches!(job.failure_reason, Some(FailureReason::Aborted { .. })));
        assert_eq!(s.tiers().await.first().map(|t| t.in_flight), Some(false));
    }
}
