//! Type-safe marketplace identifier.
//!
//! [`Marketplace`] names every external marketplace the gateway knows how to
//! talk to. It is the key for per-marketplace configuration, rate-limit
//! windows, sync tiers, and Outcome Log filtering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// External marketplace a webhook or sync run belongs to.
///
/// Serialized as its lower-case slug (`"trendyol"`, `"n11"`, ...), which is
/// also the path segment of the webhook endpoint.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Marketplace {
    /// Trendyol (Türkiye).
    Trendyol,
    /// Amazon Seller Partner.
    Amazon,
    /// eBay.
    Ebay,
    /// N11 (Türkiye).
    N11,
    /// Hepsiburada (Türkiye).
    Hepsiburada,
    /// Ozon (Russia).
    Ozon,
    /// Allegro (Poland).
    Allegro,
    /// Tokopedia (Indonesia).
    Tokopedia,
    /// Pazarama (Türkiye).
    Pazarama,
}

/// Error returned when a string does not name a known marketplace.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown marketplace: {0}")]
pub struct UnknownMarketplace(pub String);

impl Marketplace {
    /// Every known marketplace, in configuration order.
    pub const ALL: [Self; 9] = [
        Self::Trendyol,
        Self::Amazon,
        Self::Ebay,
        Self::N11,
        Self::Hepsiburada,
        Self::Ozon,
        Self::Allegro,
        Self::Tokopedia,
        Self::Pazarama,
    ];

    /// Returns the lower-case slug used in URLs and serialized records.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Trendyol => "trendyol",
            Self::Amazon => "amazon",
            Self::Ebay => "ebay",
            Self::N11 => "n11",
            Self::Hepsiburada => "hepsiburada",
            Self::Ozon => "ozon",
            Self::Allegro => "allegro",
            Self::Tokopedia => "tokopedia",
            Self::Pazarama => "pazarama",
        }
    }

    /// Returns the prefix of this marketplace's environment variables
    /// (e.g. `TRENDYOL` for `TRENDYOL_WEBHOOK_SECRET`).
    #[must_use]
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::Trendyol => "TRENDYOL",
            Self::Amazon => "AMAZON",
            Self::Ebay => "EBAY",
            Self::N11 => "N11",
            Self::Hepsiburada => "HEPSIBURADA",
            Self::Ozon => "OZON",
            Self::Allegro => "ALLEGRO",
            Self::Tokopedia => "TOKOPEDIA",
            Self::Pazarama => "PAZARAMA",
        }
    }

    /// Returns the signature header this marketplace sends unless overridden.
    #[must_use]
    pub fn default_signature_header(self) -> String {
        let name = match self {
            Self::Trendyol => "Trendyol",
            Self::Amazon => "Amazon",
            Self::Ebay => "Ebay",
            Self::N11 => "N11",
            Self::Hepsiburada => "Hepsiburada",
            Self::Ozon => "Ozon",
            Self::Allegro => "Allegro",
            Self::Tokopedia => "Tokopedia",
            Self::Pazarama => "Pazarama",
        };
        format!("X-{name}-Signature")
    }
}

impl fmt::Display for Marketplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Marketplace {
    type Err = UnknownMarketplace;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.slug().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownMarketplace(needle.to_string()))
    }
}
