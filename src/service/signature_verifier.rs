//! HMAC webhook signature verification.
//!
//! Marketplaces sign the raw request body with a shared secret and send the
//! MAC in a header. The encodings differ per marketplace, so the expected
//! format is selected by [`SignatureAlgorithm`]. Comparison goes through
//! [`Mac::verify_slice`], which is constant-time.

use std::fmt;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

/// Prefix used by [`SignatureAlgorithm::HmacSha256Prefixed`].
const SHA256_PREFIX: &str = "sha256=";

/// Header encoding of an HMAC-SHA256 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureAlgorithm {
    /// Hex digest, either case.
    HmacSha256Hex,
    /// `sha256=<hex digest>`.
    HmacSha256Prefixed,
    /// Standard base64 digest.
    HmacSha256Base64,
}

impl SignatureAlgorithm {
    /// Configuration name of the algorithm.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HmacSha256Hex => "hmac-sha256-hex",
            Self::HmacSha256Prefixed => "hmac-sha256-prefixed",
            Self::HmacSha256Base64 => "hmac-sha256-base64",
        }
    }

    /// Decodes a header value into raw MAC bytes. `None` if malformed.
    fn decode(self, provided: &str) -> Option<Vec<u8>> {
        let provided = provided.trim();
        match self {
            Self::HmacSha256Hex => hex::decode(provided).ok(),
            Self::HmacSha256Prefixed => provided
                .strip_prefix(SHA256_PREFIX)
                .and_then(|digest| hex::decode(digest).ok()),
            Self::HmacSha256Base64 => STANDARD.decode(provided).ok(),
        }
    }

    /// Encodes raw MAC bytes as a header value.
    fn encode(self, mac: &[u8]) -> String {
        match self {
            Self::HmacSha256Hex => hex::encode(mac),
            Self::HmacSha256Prefixed => format!("{SHA256_PREFIX}{}", hex::encode(mac)),
            Self::HmacSha256Base64 => STANDARD.encode(mac),
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hmac-sha256-hex" | "hex" => Ok(Self::HmacSha256Hex),
            "hmac-sha256-prefixed" | "prefixed" => Ok(Self::HmacSha256Prefixed),
            "hmac-sha256-base64" | "base64" => Ok(Self::HmacSha256Base64),
            other => Err(format!("unknown signature algorithm: {other}")),
        }
    }
}

/// Shared webhook secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct WebhookSecret(Vec<u8>);

impl WebhookSecret {
    /// Wraps a secret. Returns `None` for an empty secret.
    #[must_use]
    pub fn new(secret: impl Into<Vec<u8>>) -> Option<Self> {
        let bytes = secret.into();
        if bytes.is_empty() {
            None
        } else {
            Some(Self(bytes))
        }
    }

    fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(<redacted>)")
    }
}

/// Verifies `provided_signature` against an HMAC of `raw_payload`.
///
/// Returns `false`, never an error, when the secret is missing, the
/// signature is missing or cannot be decoded, or the payload is empty.
#[must_use]
pub fn verify(
    secret: Option<&WebhookSecret>,
    raw_payload: &[u8],
    provided_signature: Option<&str>,
    algorithm: SignatureAlgorithm,
) -> bool {
    let (Some(secret), Some(provided)) = (secret, provided_signature) else {
        return false;
    };
    if raw_payload.is_empty() {
        return false;
    }
    let Some(expected) = algorithm.decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.expose()) else {
        return false;
    };
    mac.update(raw_payload);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the header value a marketplace would send for `raw_payload`.
#[must_use]
pub fn sign(secret: &WebhookSecret, raw_payload: &[u8], algorithm: SignatureAlgorithm) -> String {
    // HMAC accepts keys of any length, so construction cannot fail.
    let mac = HmacSha256::new_from_slice(secret.expose()).map(|mut mac| {
        mac.update(raw_payload);
        mac.finalize().into_bytes()
    });
    match mac {
        Ok(bytes) => algorithm.encode(&bytes),
        Err(_) => String::new(),
    }
}
