//! Execution of a single tier run.
//!
//! The executor asks the [`RateLimiter`] for admission, calls the
//! [`MarketplaceSync`] capability with the tier's item budget, retries
//! transient item failures, and classifies the run into a terminal
//! [`SyncJob`]. Every job is appended to the Outcome Log exactly once,
//! whatever its status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::marketplace_sync::{CapabilityError, ItemError, MarketplaceSync};
use super::rate_limiter::RateLimiter;
use crate::domain::{ErrorSample, FailureReason, Marketplace, OutcomeRecord, Priority, SyncJob};
use crate::persistence::OutcomeLog;

/// Limits applied to every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Deadline for a whole run, retries included.
    pub max_duration: Duration,
    /// Retries per transient item failure.
    pub item_max_retries: u32,
}

/// One dispatched tier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    /// Marketplace to synchronize.
    pub marketplace: Marketplace,
    /// Tier priority.
    pub priority: Priority,
    /// Maximum items for this run.
    pub item_budget: usize,
    /// Dispatch timestamp, copied into the job.
    pub started_at: DateTime<Utc>,
}

/// Runs tier jobs against the marketplace capability.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    limiter: Arc<RateLimiter>,
    capability: Arc<dyn MarketplaceSync>,
    outcome_log: Arc<dyn OutcomeLog>,
    config: ExecutorConfig,
}

/// Item accounting after retries.
struct RunTally {
    attempted: u64,
    succeeded: u64,
    errors: Vec<ErrorSample>,
}

impl JobExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        limiter: Arc<RateLimiter>,
        capability: Arc<dyn MarketplaceSync>,
        outcome_log: Arc<dyn OutcomeLog>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            limiter,
            capability,
            outcome_log,
            config,
        }
    }

    /// Executes one run and returns the terminal job, already recorded.
    pub async fn execute(&self, request: &SyncRequest) -> SyncJob {
        let job = SyncJob::start(request.marketplace, request.priority, request.started_at);

        let admission = self.limiter.try_admit(request.marketplace, Utc::now());
        let job = if admission.allowed {
            self.run_admitted(job, request).await
        } else {
            let retry_after_ms = admission
                .retry_after
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
            job.fail(FailureReason::RateLimited { retry_after_ms }, Utc::now())
        };
        self.conclude(job).await
    }

    /// Records a run whose task ended without a result, so every dispatch
    /// still leaves a job in the Outcome Log.
    pub async fn record_aborted(&self, request: &SyncRequest, message: String) -> SyncJob {
        let job = SyncJob::start(request.marketplace, request.priority, request.started_at)
            .fail(FailureReason::Aborted { message }, Utc::now());
        self.conclude(job).await
    }

    async fn conclude(&self, job: SyncJob) -> SyncJob {
        tracing::info!(
            job_id = %job.job_id,
            marketplace = %job.marketplace,
            priority = %job.priority,
            status = job.status.as_str(),
            items_attempted = job.items_attempted,
            items_succeeded = job.items_succeeded,
            "sync job finished"
        );

        if let Err(e) = self.outcome_log.record(OutcomeRecord::Job(job.clone())).await {
            tracing::error!(job_id = %job.job_id, error = %e, "failed to record sync job");
        }
        job
    }

    /// Runs the capability and the item retries under one deadline. Counts
    /// already reported survive a deadline hit during the retry phase.
    async fn run_admitted(&self, job: SyncJob, request: &SyncRequest) -> SyncJob {
        let deadline = Instant::now() + self.config.max_duration;

        let sync = self
            .capability
            .sync(request.marketplace, request.priority, request.item_budget);
        let report = match tokio::time::timeout_at(deadline, sync).await {
            Ok(Ok(report)) => report,
            Ok(Err(CapabilityError::Unavailable(message))) => {
                return job.fail(
                    FailureReason::CapabilityUnavailable { message },
                    Utc::now(),
                );
            }
            Err(_) => return self.timed_out(job, request),
        };

        let mut tally = RunTally {
            attempted: report.attempted,
            succeeded: report.succeeded,
            errors: Vec::new(),
        };

        let mut pending = report.errors.into_iter();
        while let Some(error) = pending.next() {
            let item_id = error.item_id.clone();
            let message = error.message.clone();
            let mut attempts = 1;
            let retried = {
                let retry = self.retry(request, error, &mut attempts);
                tokio::time::timeout_at(deadline, retry).await
            };
            match retried {
                Ok(Ok(())) => tally.succeeded = tally.succeeded.saturating_add(1),
                Ok(Err(sample)) => tally.errors.push(sample),
                Err(_) => {
                    tally.errors.push(ErrorSample {
                        item_id,
                        message,
                        attempts,
                    });
                    tally.errors.extend(pending.map(|e| ErrorSample {
                        item_id: e.item_id,
                        message: e.message,
                        attempts: 1,
                    }));
                    let job =
                        job.finish(tally.attempted, tally.succeeded, tally.errors, Utc::now());
                    return self.timed_out(job, request);
                }
            }
        }
        job.finish(tally.attempted, tally.succeeded, tally.errors, Utc::now())
    }

    fn timed_out(&self, job: SyncJob, request: &SyncRequest) -> SyncJob {
        let deadline_ms = u64::try_from(self.config.max_duration.as_millis()).unwrap_or(u64::MAX);
        tracing::warn!(
            marketplace = %request.marketplace,
            priority = %request.priority,
            deadline_ms,
            items_attempted = job.items_attempted,
            "sync job exceeded its deadline"
        );
        job.fail(FailureReason::Timeout { deadline_ms }, Utc::now())
    }

    /// Retries a failed item until it succeeds, fails permanently, runs out
    /// of attempts, or is refused by the rate limiter.
    ///
    /// `attempts` counts the first try and is kept current while retrying.
    async fn retry(
        &self,
        request: &SyncRequest,
        first: ItemError,
        attempts: &mut u32,
    ) -> Result<(), ErrorSample> {
        let mut last = first;

        while last.transient && *attempts <= self.config.item_max_retries {
            let Some(item_id) = last.item_id.clone() else {
                break;
            };
            if !self.limiter.try_admit(request.marketplace, Utc::now()).allowed {
                tracing::debug!(
                    marketplace = %request.marketplace,
                    item_id = %item_id,
                    "item retry refused by rate limiter"
                );
                break;
            }
            *attempts = attempts.saturating_add(1);
            match self
                .capability
                .retry_item(request.marketplace, request.priority, &item_id)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => last = e,
            }
        }

        Err(ErrorSample {
            item_id: last.item_id,
            message: last.message,
            attempts: *attempts,
        })
    }
}
