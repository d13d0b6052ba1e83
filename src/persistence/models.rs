//! Database row model for the `outcome_log` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OutcomeLogError;
use crate::domain::{OutcomeEntry, OutcomeRecord};

/// A stored row from the `outcome_log` table.
///
/// `kind`, `marketplace` and `status` duplicate fields of `payload` so they
/// can be indexed and filtered in SQL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOutcome {
    /// Auto-increment row ID, used as the entry sequence.
    pub id: i64,
    /// `webhook` or `job`.
    pub kind: String,
    /// Marketplace slug.
    pub marketplace: String,
    /// Flat status string.
    pub status: String,
    /// Server-side insert timestamp.
    pub recorded_at: DateTime<Utc>,
    /// The full record as JSONB.
    pub payload: serde_json::Value,
}

impl StoredOutcome {
    /// Decodes the row back into a log entry.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeLogError::Serialization`] if the payload no longer
    /// matches the record schema.
    pub fn into_entry(self) -> Result<OutcomeEntry, OutcomeLogError> {
        let record: OutcomeRecord = serde_json::from_value(self.payload)
            .map_err(|e| OutcomeLogError::Serialization(e.to_string()))?;
        Ok(OutcomeEntry {
            sequence: self.id,
            recorded_at: self.recorded_at,
            record,
        })
    }
}
