//! Outcome Log query parameters and listing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::ListMeta;
use crate::domain::{Marketplace, OutcomeEntry, OutcomeKind, OutcomeQuery};
use crate::error::GatewayError;

/// Query parameters for `GET /api/v1/outcomes`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OutcomeQueryParams {
    /// Marketplace slug.
    pub marketplace: Option<String>,
    /// `webhook` or `job`.
    pub kind: Option<String>,
    /// Record status (`processed`, `rejected`, `succeeded`, `failed`, ...).
    pub status: Option<String>,
    /// Recorded at or after (RFC 3339).
    pub from: Option<DateTime<Utc>>,
    /// Recorded before (RFC 3339).
    pub to: Option<DateTime<Utc>>,
    /// Maximum entries (default 100, max 1000).
    pub limit: Option<usize>,
}

impl OutcomeQueryParams {
    /// Validates the parameters into a log query.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnknownMarketplace`] for an unknown slug and
    /// [`GatewayError::InvalidRequest`] for an unknown kind or an inverted
    /// time range.
    pub fn into_query(self) -> Result<OutcomeQuery, GatewayError> {
        let marketplace = self
            .marketplace
            .as_deref()
            .map(str::parse::<Marketplace>)
            .transpose()?;
        let kind = match self.kind.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(k) if k.eq_ignore_ascii_case("webhook") => Some(OutcomeKind::Webhook),
            Some(k) if k.eq_ignore_ascii_case("job") => Some(OutcomeKind::Job),
            Some(other) => {
                return Err(GatewayError::InvalidRequest(format!(
                    "unknown outcome kind: {other}"
                )));
            }
        };
        if let (Some(from), Some(to)) = (self.from, self.to)
            && from > to
        {
            return Err(GatewayError::InvalidRequest(
                "`from` must not be after `to`".to_string(),
            ));
        }
        Ok(OutcomeQuery {
            marketplace,
            kind,
            status: self
                .status
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty()),
            from: self.from,
            to: self.to,
            limit: self.limit,
        })
    }
}

/// Response body for `GET /api/v1/outcomes`, newest entry first.
#[derive(Debug, Serialize, ToSchema)]
pub struct OutcomeListResponse {
    /// Matching entries.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<OutcomeEntry>,
    /// Listing metadata.
    pub meta: ListMeta,
}
