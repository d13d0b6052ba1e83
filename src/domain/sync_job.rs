//! Record of one tier execution attempt.
//!
//! A [`SyncJob`] starts as [`JobStatus::Running`] and is consumed into
//! exactly one terminal status by [`SyncJob::finish`] or [`SyncJob::fail`].
//! Terminal jobs are never mutated again; they are appended to the Outcome
//! Log as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Marketplace, Priority};

/// Maximum number of item errors kept on a job.
pub const MAX_ERROR_SAMPLES: usize = 20;

/// Lifecycle status of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Started, not finished.
    Running,
    /// Every attempted item succeeded.
    Succeeded,
    /// The run completed but some items failed.
    PartiallyFailed,
    /// The run could not be carried out.
    Failed,
}

impl JobStatus {
    /// Snake-case status name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
        }
    }
}

/// Why a job ended as [`JobStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The rate limiter refused the call; nothing was sent upstream.
    RateLimited {
        /// Milliseconds until the saturated window resets.
        retry_after_ms: Option<u64>,
    },
    /// The run exceeded its deadline and was abandoned.
    Timeout {
        /// Configured deadline in milliseconds.
        deadline_ms: u64,
    },
    /// The marketplace capability could not be reached at all.
    CapabilityUnavailable {
        /// Error reported by the capability.
        message: String,
    },
    /// The run task ended without producing a result.
    Aborted {
        /// What stopped the task.
        message: String,
    },
}

/// One failed item kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorSample {
    /// Marketplace-side item identifier, when known.
    pub item_id: Option<String>,
    /// Error message of the last attempt.
    pub message: String,
    /// Attempts made, including retries.
    pub attempts: u32,
}

/// One execution attempt of a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SyncJob {
    /// Job identifier.
    pub job_id: Uuid,
    /// Marketplace synchronized.
    pub marketplace: Marketplace,
    /// Tier priority.
    pub priority: Priority,
    /// Dispatch timestamp.
    pub started_at: DateTime<Utc>,
    /// Completion timestamp; `None` while running.
    pub finished_at: Option<DateTime<Utc>>,
    /// Current status.
    pub status: JobStatus,
    /// Items the capability tried to synchronize.
    pub items_attempted: u64,
    /// Items that ended up synchronized.
    pub items_succeeded: u64,
    /// Bounded sample of item failures.
    pub error_samples: Vec<ErrorSample>,
    /// Set when `status` is [`JobStatus::Failed`].
    pub failure_reason: Option<FailureReason>,
}

impl SyncJob {
    /// Creates a running job.
    #[must_use]
    pub fn start(marketplace: Marketplace, priority: Priority, started_at: DateTime<Utc>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            marketplace,
            priority,
            started_at,
            finished_at: None,
            status: JobStatus::Running,
            items_attempted: 0,
            items_succeeded: 0,
            error_samples: Vec::new(),
            failure_reason: None,
        }
    }

    /// Completes a run that reached the marketplace.
    ///
    /// Classified [`JobStatus::Succeeded`] when nothing failed, otherwise
    /// [`JobStatus::PartiallyFailed`]. Only the first [`MAX_ERROR_SAMPLES`]
    /// errors are kept; the failure count stays derivable from the item
    /// counters.
    #[must_use]
    pub fn finish(
        mut self,
        items_attempted: u64,
        items_succeeded: u64,
        mut errors: Vec<ErrorSample>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let items_succeeded = items_succeeded.min(items_attempted);
        errors.truncate(MAX_ERROR_SAMPLES);

        self.status = if items_succeeded == items_attempted && errors.is_empty() {
            JobStatus::Succeeded
        } else {
            JobStatus::PartiallyFailed
        };
        self.items_attempted = items_attempted;
        self.items_succeeded = items_succeeded;
        self.error_samples = errors;
        self.finished_at = Some(finished_at);
        self
    }

    /// Completes a run that failed as a whole.
    #[must_use]
    pub fn fail(mut self, reason: FailureReason, finished_at: DateTime<Utc>) -> Self {
        self.status = JobStatus::Failed;
        self.failure_reason = Some(reason);
        self.finished_at = Some(finished_at);
        self
    }

    /// Items that did not synchronize.
    #[must_use]
    pub const fn items_failed(&self) -> u64 {
        self.items_attempted.saturating_sub(self.items_succeeded)
    }

    /// `true` if the job never left the gateway because of rate limiting.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self.failure_reason, Some(FailureReason::RateLimited { .. }))
    }

    /// `true` once the job reached a terminal status.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self.status, JobStatus::Running)
    }
}
