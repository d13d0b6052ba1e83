//! Outbound synchronization capability.
//!
//! The concrete marketplace REST clients live outside this crate. The job
//! executor depends only on [`MarketplaceSync`]; deployments plug in a real
//! client, and [`UnconfiguredSync`] stands in when none is wired so that
//! runs fail visibly instead of reporting invented results.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{Marketplace, Priority};

/// Failure of a single item within a run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ItemError {
    /// Marketplace-side item identifier, when known. Items without one
    /// cannot be retried individually.
    pub item_id: Option<String>,
    /// Error reported by the marketplace.
    pub message: String,
    /// `true` for timeouts and 5xx-style failures worth retrying.
    pub transient: bool,
}

impl ItemError {
    /// A retryable failure.
    #[must_use]
    pub fn transient(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            message: message.into(),
            transient: true,
        }
    }

    /// A failure that will not go away on retry.
    #[must_use]
    pub fn permanent(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            message: message.into(),
            transient: false,
        }
    }
}

/// Result of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Items the pass tried to synchronize.
    pub attempted: u64,
    /// Items that synchronized on the first attempt.
    pub succeeded: u64,
    /// Failures, one per failed item.
    pub errors: Vec<ItemError>,
}

/// The capability as a whole could not be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapabilityError {
    /// The marketplace API or client is unreachable.
    #[error("marketplace capability unavailable: {0}")]
    Unavailable(String),
}

/// Marketplace-specific synchronization, provided by the storefront side.
#[async_trait]
pub trait MarketplaceSync: Send + Sync + Debug {
    /// Synchronizes up to `item_budget` items of the tier's scope.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError`] when the marketplace cannot be reached at
    /// all. Per-item failures belong in [`SyncReport::errors`].
    async fn sync(
        &self,
        marketplace: Marketplace,
        priority: Priority,
        item_budget: usize,
    ) -> Result<SyncReport, CapabilityError>;

    /// Retries a single failed item.
    ///
    /// # Errors
    ///
    /// Returns the [`ItemError`] of the retry attempt.
    async fn retry_item(
        &self,
        marketplace: Marketplace,
        priority: Priority,
        item_id: &str,
    ) -> Result<(), ItemError>;
}

/// Capability used when no marketplace client has been configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredSync;

#[async_trait]
impl MarketplaceSync for UnconfiguredSync {
    async fn sync(
        &self,
        marketplace: Marketplace,
        _priority: Priority,
        _item_budget: usize,
    ) -> Result<SyncReport, CapabilityError> {
        Err(CapabilityError::Unavailable(format!(
            "no synchronization client configured for {marketplace}"
        )))
    }

    async fn retry_item(
        &self,
        marketplace: Marketplace,
        _priority: Priority,
        item_id: &str,
    ) -> Result<(), ItemError> {
        Err(ItemError::permanent(
            item_id,
            format!("no synchronization client configured for {marketplace}"),
        ))
    }
}
