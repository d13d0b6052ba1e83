//! Shared DTO types used across multiple endpoints.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::Marketplace;
use crate::error::GatewayError;

/// Metadata included in list responses.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ListMeta {
    /// Number of items in `data`.
    pub returned: usize,
    /// Limit applied to the query.
    pub limit: usize,
}

/// Parses a marketplace slug taken from a request path.
///
/// # Errors
///
/// Returns [`GatewayError::UnknownMarketplace`] if the slug names no known
/// marketplace.
pub fn parse_marketplace(slug: &str) -> Result<Marketplace, GatewayError> {
    slug.parse::<Marketplace>().map_err(GatewayError::from)
}
