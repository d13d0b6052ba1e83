//! PostgreSQL implementation of the Outcome Log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::StoredOutcome;
use super::{OutcomeLog, OutcomeLogError};
use crate::domain::{OutcomeEntry, OutcomeQuery, OutcomeRecord};

type OutcomeRow = (i64, String, String, String, DateTime<Utc>, serde_json::Value);

/// PostgreSQL-backed Outcome Log using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresOutcomeLog {
    pool: PgPool,
}

impl PostgresOutcomeLog {
    /// Creates a log writing through the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeLogError::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), OutcomeLogError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OutcomeLogError::Storage(e.to_string()))
    }
}

#[async_trait]
impl OutcomeLog for PostgresOutcomeLog {
    async fn record(&self, record: OutcomeRecord) -> Result<OutcomeEntry, OutcomeLogError> {
        let payload = serde_json::to_value(&record)
            .map_err(|e| OutcomeLogError::Serialization(e.to_string()))?;

        let (id, recorded_at) = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            "INSERT INTO outcome_log (kind, marketplace, status, payload) \
             VALUES ($1, $2, $3, $4) RETURNING id, recorded_at",
        )
        .bind(record.kind().as_str())
        .bind(record.marketplace().slug())
        .bind(record.status_str())
        .bind(&payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| OutcomeLogError::Storage(e.to_string()))?;

        Ok(OutcomeEntry {
            sequence: id,
            recorded_at,
            record,
        })
    }

    async fn query(&self, query: &OutcomeQuery) -> Result<Vec<OutcomeEntry>, OutcomeLogError> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            "SELECT id, kind, marketplace, status, recorded_at, payload FROM outcome_log WHERE TRUE",
        );
        if let Some(marketplace) = query.marketplace {
            builder.push(" AND marketplace = ").push_bind(marketplace.slug());
        }
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(status) = &query.status {
            builder.push(" AND status = ").push_bind(status.clone());
        }
        if let Some(from) = query.from {
            builder.push(" AND recorded_at >= ").push_bind(from);
        }
        if let Some(to) = query.to {
            builder.push(" AND recorded_at < ").push_bind(to);
        }
        builder
            .push(" ORDER BY id DESC LIMIT ")
            .push_bind(i64::try_from(query.effective_limit()).unwrap_or(i64::MAX));

        let rows = builder
            .build_query_as::<OutcomeRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| OutcomeLogError::Storage(e.to_string()))?;

        rows.into_iter()
            .map(|(id, kind, marketplace, status, recorded_at, payload)| {
                StoredOutcome {
                    id,
                    kind,
                    marketplace,
                    status,
                    recorded_at,
                    payload,
                }
                .into_entry()
            })
            .collect()
    }
}
