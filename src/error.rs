//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the API surface. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response. Webhook deliveries do not go through it: their status codes
//! come from [`crate::service::WebhookReceipt`].

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Marketplace, Priority, UnknownMarketplace};
use crate::persistence::OutcomeLogError;
use crate::service::{MarketplaceNotConfigured, RateLimiterError, TriggerError};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "unknown marketplace: etsy",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`GatewayError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                   |
/// |-----------|-------------------|-------------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request               |
/// | 2000–2999 | State/Not Found   | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server            | 500 / 503                     |
/// | 429       | Back-pressure     | 429 Too Many Requests         |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The path names a marketplace this gateway does not know.
    #[error("unknown marketplace: {0}")]
    UnknownMarketplace(String),

    /// The marketplace is known but not enabled in this deployment.
    #[error("marketplace not configured: {0}")]
    MarketplaceNotConfigured(Marketplace),

    /// No tier with this priority is configured for the marketplace.
    #[error("no {priority} tier configured for {marketplace}")]
    TierNotConfigured {
        /// Requested marketplace.
        marketplace: Marketplace,
        /// Requested priority.
        priority: Priority,
    },

    /// The tier or its marketplace worker slot is busy.
    #[error("{priority} tier of {marketplace} is already running")]
    TierBusy {
        /// Requested marketplace.
        marketplace: Marketplace,
        /// Requested priority.
        priority: Priority,
    },

    /// The marketplace rate limit is exhausted.
    #[error("rate limit exceeded; retry later")]
    RateLimited {
        /// Milliseconds until the limiter admits calls again.
        retry_after_ms: Option<u64>,
    },

    /// Outcome Log failure.
    #[error("outcome log error: {0}")]
    OutcomeLog(#[from] OutcomeLogError),

    /// Rate limiter state is unusable.
    #[error("rate limiter unavailable")]
    RateLimiterUnavailable,

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::UnknownMarketplace(_) => 2001,
            Self::MarketplaceNotConfigured(_) => 2002,
            Self::TierNotConfigured { .. } => 2003,
            Self::TierBusy { .. } => 2101,
            Self::RateLimited { .. } => 429,
            Self::Internal(_) => 3000,
            Self::OutcomeLog(_) => 3001,
            Self::RateLimiterUnavailable => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownMarketplace(_)
            | Self::MarketplaceNotConfigured(_)
            | Self::TierNotConfigured { .. } => StatusCode::NOT_FOUND,
            Self::TierBusy { .. } => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::OutcomeLog(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RateLimiterUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(format!("retry_after_ms={ms}")),
            _ => None,
        }
    }
}

impl From<UnknownMarketplace> for GatewayError {
    fn from(e: UnknownMarketplace) -> Self {
        Self::UnknownMarketplace(e.0)
    }
}

impl From<MarketplaceNotConfigured> for GatewayError {
    fn from(e: MarketplaceNotConfigured) -> Self {
        Self::MarketplaceNotConfigured(e.0)
    }
}

impl From<TriggerError> for GatewayError {
    fn from(e: TriggerError) -> Self {
        match e {
            TriggerError::NotConfigured {
                marketplace,
                priority,
            } => Self::TierNotConfigured {
                marketplace,
                priority,
            },
            TriggerError::Busy {
                marketplace,
                priority,
            } => Self::TierBusy {
                marketplace,
                priority,
            },
            TriggerError::RateLimited { retry_after_ms } => Self::RateLimited { retry_after_ms },
        }
    }
}

impl From<RateLimiterError> for GatewayError {
    fn from(e: RateLimiterError) -> Self {
        match e {
            RateLimiterError::UnknownMarketplace(m) => Self::MarketplaceNotConfigured(m),
            RateLimiterError::Unavailable => Self::RateLimiterUnavailable,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after_secs = match &self {
            Self::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(ms.div_ceil(1_000)),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.details(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        if let Some(secs) = retry_after_secs
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}
