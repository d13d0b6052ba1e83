//! In-memory Outcome Log with bounded retention.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{OutcomeLog, OutcomeLogError};
use crate::domain::{OutcomeEntry, OutcomeQuery, OutcomeRecord};

/// Ring of the most recent entries. Once `capacity` is reached the oldest
/// entry is evicted; sequence numbers keep increasing regardless.
#[derive(Debug)]
pub struct InMemoryOutcomeLog {
    capacity: usize,
    inner: RwLock<Ring>,
}

#[derive(Debug, Default)]
struct Ring {
    next_sequence: i64,
    entries: VecDeque<OutcomeEntry>,
}

impl InMemoryOutcomeLog {
    /// Creates an empty log retaining at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Ring {
                next_sequence: 1,
                entries: VecDeque::new(),
            }),
        }
    }

    /// Entries currently retained.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// `true` when nothing has been retained.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl OutcomeLog for InMemoryOutcomeLog {
    async fn record(&self, record: OutcomeRecord) -> Result<OutcomeEntry, OutcomeLogError> {
        let mut ring = self.inner.write().await;
        let entry = OutcomeEntry {
            sequence: ring.next_sequence,
            recorded_at: Utc::now(),
            record,
        };
        ring.next_sequence = ring.next_sequence.saturating_add(1);
        if ring.entries.len() >= self.capacity {
            ring.entries.pop_front();
        }
        ring.entries.push_back(entry.clone());
        Ok(entry)
    }

    async fn query(&self, query: &OutcomeQuery) -> Result<Vec<OutcomeEntry>, OutcomeLogError> {
        let ring = self.inner.read().await;
        Ok(ring
            .entries
            .iter()
            .rev()
            .filter(|entry| query.matches(entry))
            .take(query.effective_limit())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{
        Marketplace, OutcomeKind, Priority, SyncJob, WebhookDisposition, WebhookOutcome,
    };
    use uuid::Uuid;

    fn job(marketplace: Marketplace) -> OutcomeRecord {
        OutcomeRecord::Job(
            SyncJob::start(marketplace, Priority::High, Utc::now())
                .finish(3, 3, Vec::new(), Utc::now()),
        )
    }

    fn rejected(marketplace: Marketplace) -> OutcomeRecord {
        OutcomeRecord::Webhook(WebhookOutcome {
            event_id: Uuid::new_v4(),
            marketplace,
            event_type: None,
            marketplace_event_id: None,
            received_at: Utc::now(),
            signature_valid: false,
            payload_bytes: 2,
            disposition: WebhookDisposition::Rejected {
                reason: "signature mismatch".to_string(),
            },
        })
    }

    #[tokio::test]
    async fn records_get_increasing_sequence_numbers() {
        let log = InMemoryOutcomeLog::new(10);
        let Ok(first) = log.record(job(Marketplace::Trendyol)).await else {
            panic!("record failed");
        };
        let Ok(second) = log.record(job(Marketplace::Trendyol)).await else {
            panic!("record failed");
        };
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
    }

    #[tokio::test]
    async fn query_returns_newest_first_with_filters() {
        let log = InMemoryOutcomeLog::new(10);
        let _ = log.record(job(Marketplace::Trendyol)).await;
        let _ = log.record(rejected(Marketplace::Trendyol)).await;
        let _ = log.record(job(Marketplace::Ozon)).await;

        let Ok(all) = log.query(&OutcomeQuery::default()).await else {
            panic!("query failed");
        };
        let sequences: Vec<i64> = all.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![3, 2, 1]);

        let Ok(trendyol_jobs) = log
            .query(&OutcomeQuery {
                marketplace: Some(Marketplace::Trendyol),
                kind: Some(OutcomeKind::Job),
                ..OutcomeQuery::default()
            })
            .await
        else {
            panic!("query failed");
        };
        assert_eq!(trendyol_jobs.len(), 1);

        let Ok(rejections) = log
            .query(&OutcomeQuery {
                status: Some("rejected".to_string()),
                ..OutcomeQuery::default()
            })
            .await
        else {
            panic!("query failed");
        };
        assert_eq!(rejections.len(), 1);
    }

    #[tokio::test]
    async fn retention_evicts_oldest() {
        let log = InMemoryOutcomeLog::new(2);
        for _ in 0..5 {
            let _ = log.record(job(Marketplace::N11)).await;
        }
        assert_eq!(log.len().await, 2);
        let Ok(entries) = log.query(&OutcomeQuery::default()).await else {
            panic!("query failed");
        };
        let sequences: Vec<i64> = entries.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![5, 4]);
    }

    #[tokio::test]
    async fn limit_caps_results() {
        let log = InMemoryOutcomeLog::new(100);
        for _ in 0..10 {
            let _ = log.record(job(Marketplace::Amazon)).await;
        }
        let Ok(entries) = log
            .query(&OutcomeQuery {
                limit: Some(3),
                ..OutcomeQuery::default()
            })
            .await
        else {
            panic!("query failed");
        };
        assert_eq!(entries.len(), 3);
    }
}
