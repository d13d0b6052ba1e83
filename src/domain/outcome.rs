//! Records appended to the Outcome Log.
//!
//! Both webhook verification/dispatch results and finished sync jobs are
//! stored as an [`OutcomeRecord`]. Every record exposes a flat status string
//! so dashboards can filter across kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{HandlerId, Marketplace, SyncJob};

/// What happened to an inbound webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "disposition", rename_all = "snake_case")]
pub enum WebhookDisposition {
    /// Verified, classified and accepted by a handler.
    Processed {
        /// Handler the event was routed to.
        handler: HandlerId,
        /// `true` when the event type had no mapping.
        unknown_event_type: bool,
    },
    /// Signature check failed; the payload was not interpreted.
    Rejected {
        /// Why verification failed.
        reason: String,
    },
    /// Signature valid but the body could not be parsed.
    Malformed {
        /// Parse error.
        reason: String,
    },
    /// Signature valid but no handler accepted the event in time.
    DispatchFailed {
        /// Dispatch error.
        reason: String,
    },
}

/// Audit entry for one inbound webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookOutcome {
    /// Locally assigned event identifier.
    pub event_id: Uuid,
    /// Source marketplace.
    pub marketplace: Marketplace,
    /// Declared event type, if the payload was interpreted.
    pub event_type: Option<String>,
    /// Marketplace's own event identifier, if the payload was interpreted.
    pub marketplace_event_id: Option<String>,
    /// Receipt timestamp.
    pub received_at: DateTime<Utc>,
    /// Verification result.
    pub signature_valid: bool,
    /// Size of the raw payload in bytes.
    pub payload_bytes: usize,
    /// Final decision.
    #[serde(flatten)]
    pub disposition: WebhookDisposition,
}

/// Kind discriminator for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Webhook audit entries.
    Webhook,
    /// Sync job entries.
    Job,
}

impl OutcomeKind {
    /// Snake-case kind name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Job => "job",
        }
    }
}

/// A record in the Outcome Log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeRecord {
    /// Webhook verification and dispatch result.
    Webhook(WebhookOutcome),
    /// Finished sync job.
    Job(SyncJob),
}

impl OutcomeRecord {
    /// Record kind.
    #[must_use]
    pub const fn kind(&self) -> OutcomeKind {
        match self {
            Self::Webhook(_) => OutcomeKind::Webhook,
            Self::Job(_) => OutcomeKind::Job,
        }
    }

    /// Marketplace the record belongs to.
    #[must_use]
    pub const fn marketplace(&self) -> Marketplace {
        match self {
            Self::Webhook(w) => w.marketplace,
            Self::Job(j) => j.marketplace,
        }
    }

    /// Flat status used for filtering.
    #[must_use]
    pub const fn status_str(&self) -> &'static str {
        match self {
            Self::Webhook(w) => match w.disposition {
                WebhookDisposition::Processed { .. } => "processed",
                WebhookDisposition::Rejected { .. } => "rejected",
                WebhookDisposition::Malformed { .. } => "malformed",
                WebhookDisposition::DispatchFailed { .. } => "dispatch_failed",
            },
            Self::Job(j) => j.status.as_str(),
        }
    }
}

/// A record with its position in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEntry {
    /// Monotonic sequence number assigned on append.
    pub sequence: i64,
    /// Append timestamp.
    pub recorded_at: DateTime<Utc>,
    /// The record itself.
    pub record: OutcomeRecord,
}

/// Default number of entries returned by a query.
pub const DEFAULT_QUERY_LIMIT: usize = 100;

/// Upper bound on entries returned by a query.
pub const MAX_QUERY_LIMIT: usize = 1_000;

/// Filter for reading the Outcome Log. All fields are optional and combined
/// with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeQuery {
    /// Only this marketplace.
    pub marketplace: Option<Marketplace>,
    /// Only this kind.
    pub kind: Option<OutcomeKind>,
    /// Only this status (see [`OutcomeRecord::status_str`]).
    pub status: Option<String>,
    /// Recorded at or after.
    pub from: Option<DateTime<Utc>>,
    /// Recorded strictly before.
    pub to: Option<DateTime<Utc>>,
    /// Maximum entries; defaults to [`DEFAULT_QUERY_LIMIT`].
    pub limit: Option<usize>,
}

impl OutcomeQuery {
    /// Effective limit, clamped to `1..=MAX_QUERY_LIMIT`.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_QUERY_LIMIT)
            .clamp(1, MAX_QUERY_LIMIT)
    }

    /// `true` if `entry` passes every filter.
    #[must_use]
    pub fn matches(&self, entry: &OutcomeEntry) -> bool {
        let record = &entry.record;
        self.marketplace.is_none_or(|m| record.marketplace() == m)
            && self.kind.is_none_or(|k| record.kind() == k)
            && self
                .status
                .as_deref()
                .is_none_or(|s| record.status_str() == s)
            && self.from.is_none_or(|from| entry.recorded_at >= from)
            && self.to.is_none_or(|to| entry.recorded_at < to)
    }
}
