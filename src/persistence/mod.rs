//! Persistence layer: the append-only Outcome Log.
//!
//! [`OutcomeLog`] is the write/read contract the gateway and the job
//! executor depend on. [`InMemoryOutcomeLog`] keeps a bounded ring of recent
//! entries; [`PostgresOutcomeLog`] stores every entry in the `outcome_log`
//! table through `sqlx::PgPool`.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{OutcomeEntry, OutcomeQuery, OutcomeRecord};

pub use memory::InMemoryOutcomeLog;
pub use postgres::PostgresOutcomeLog;

/// Errors raised by an Outcome Log backend.
#[derive(Debug, thiserror::Error)]
pub enum OutcomeLogError {
    /// The backing store rejected or could not complete the operation.
    #[error("outcome log storage error: {0}")]
    Storage(String),

    /// A stored record could not be encoded or decoded.
    #[error("outcome log serialization error: {0}")]
    Serialization(String),
}

/// Append-only store of webhook and job outcomes.
///
/// Writers only ever insert; concurrent writers need no coordination beyond
/// what the implementation does internally.
#[async_trait]
pub trait OutcomeLog: Send + Sync + Debug {
    /// Appends a record and returns it with its sequence number.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeLogError`] if the record could not be stored.
    async fn record(&self, record: OutcomeRecord) -> Result<OutcomeEntry, OutcomeLogError>;

    /// Returns matching entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`OutcomeLogError`] if the store could not be read.
    async fn query(&self, query: &OutcomeQuery) -> Result<Vec<OutcomeEntry>, OutcomeLogError>;
}
