//! Inbound webhook notification.
//!
//! A [`WebhookEvent`] is created the moment the HTTP body has been read in
//! full. The raw bytes are kept untouched until the signature has been
//! checked against them; only a verified event may be inspected further and
//! turned into a [`ClassifiedEvent`] for a handler.

use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Marketplace;

/// Payload keys carrying the marketplace's declared event type, in lookup order.
const EVENT_TYPE_KEYS: [&str; 4] = ["event_type", "eventType", "event", "type"];

/// Payload keys carrying the marketplace's own event identifier, in lookup order.
const EVENT_ID_KEYS: [&str; 4] = ["event_id", "eventId", "id", "messageId"];

/// Logical handler a verified event is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum HandlerId {
    /// A new order was placed.
    OrderCreated,
    /// An existing order changed status or content.
    OrderUpdated,
    /// An order was cancelled.
    OrderCancelled,
    /// An order was refunded or returned.
    OrderRefunded,
    /// Shipment or tracking information changed.
    ShipmentUpdated,
    /// Available stock for a listing changed.
    StockChanged,
    /// Price of a listing changed.
    PriceChanged,
    /// Product or listing status changed.
    ProductStatusChanged,
    /// A listing passed marketplace review.
    ListingApproved,
    /// A listing failed marketplace review.
    ListingRejected,
    /// A payment was settled.
    PaymentCompleted,
    /// A campaign started or ended.
    CampaignChanged,
    /// A customer opened or progressed a return request.
    ReturnRequested,
    /// A customer question arrived.
    QuestionReceived,
    /// A customer review arrived.
    ReviewReceived,
    /// Fallback for event types without a mapping: log and acknowledge.
    LogAndAcknowledge,
}

impl HandlerId {
    /// Parses the snake_case handler name used in mapping-table configuration.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        serde_json::from_value(serde_json::Value::String(name.trim().to_string())).ok()
    }

    /// Returns the snake_case handler name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrderCreated => "order_created",
            Self::OrderUpdated => "order_updated",
            Self::OrderCancelled => "order_cancelled",
            Self::OrderRefunded => "order_refunded",
            Self::ShipmentUpdated => "shipment_updated",
            Self::StockChanged => "stock_changed",
            Self::PriceChanged => "price_changed",
            Self::ProductStatusChanged => "product_status_changed",
            Self::ListingApproved => "listing_approved",
            Self::ListingRejected => "listing_rejected",
            Self::PaymentCompleted => "payment_completed",
            Self::CampaignChanged => "campaign_changed",
            Self::ReturnRequested => "return_requested",
            Self::QuestionReceived => "question_received",
            Self::ReviewReceived => "review_received",
            Self::LogAndAcknowledge => "log_and_acknowledge",
        }
    }
}

/// Errors raised when the event lifecycle is driven out of order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookEventError {
    /// The verification result was already recorded.
    #[error("signature verification already recorded for event {0}")]
    VerificationAlreadyRecorded(Uuid),

    /// The payload was inspected before a successful verification.
    #[error("event {0} has not passed signature verification")]
    NotVerified(Uuid),

    /// The payload is not a JSON document.
    #[error("payload is not valid JSON: {0}")]
    MalformedPayload(String),
}

/// One inbound webhook notification, owned by the gateway while it is verified.
#[derive(Debug)]
pub struct WebhookEvent {
    event_id: Uuid,
    marketplace: Marketplace,
    raw_payload: Bytes,
    received_at: DateTime<Utc>,
    signature_valid: Option<bool>,
}

impl WebhookEvent {
    /// Captures a freshly received payload.
    #[must_use]
    pub fn new(marketplace: Marketplace, raw_payload: Bytes, received_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            marketplace,
            raw_payload,
            received_at,
            signature_valid: None,
        }
    }

    /// Locally assigned identifier.
    #[must_use]
    pub const fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Source marketplace.
    #[must_use]
    pub const fn marketplace(&self) -> Marketplace {
        self.marketplace
    }

    /// Exact bytes received on the wire.
    #[must_use]
    pub fn raw_payload(&self) -> &[u8] {
        &self.raw_payload
    }

    /// Receipt timestamp.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Verification result, `None` until verification has run.
    #[must_use]
    pub const fn signature_valid(&self) -> Option<bool> {
        self.signature_valid
    }

    /// Records the verification result. It can be set exactly once.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookEventError::VerificationAlreadyRecorded`] on a second call.
    pub fn record_verification(&mut self, valid: bool) -> Result<(), WebhookEventError> {
        if self.signature_valid.is_some() {
            return Err(WebhookEventError::VerificationAlreadyRecorded(self.event_id));
        }
        self.signature_valid = Some(valid);
        Ok(())
    }

    /// Parses the verified payload and extracts the routing metadata.
    ///
    /// `header_event_type` is used only when the body declares no event type.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookEventError::NotVerified`] if the signature has not
    /// been accepted, or [`WebhookEventError::MalformedPayload`] if the body
    /// is not JSON.
    pub fn inspect(
        &self,
        header_event_type: Option<&str>,
    ) -> Result<InspectedPayload, WebhookEventError> {
        if self.signature_valid != Some(true) {
            return Err(WebhookEventError::NotVerified(self.event_id));
        }

        let payload: serde_json::Value = serde_json::from_slice(&self.raw_payload)
            .map_err(|e| WebhookEventError::MalformedPayload(e.to_string()))?;

        let event_type = first_string(&payload, &EVENT_TYPE_KEYS)
            .or_else(|| header_event_type.map(str::to_string))
            .unwrap_or_default();
        let marketplace_event_id = first_string(&payload, &EVENT_ID_KEYS);

        Ok(InspectedPayload {
            event_type,
            marketplace_event_id,
            payload,
        })
    }

    /// Hands the event over to its handler. Consumes the gateway-owned event.
    #[must_use]
    pub fn into_classified(
        self,
        inspected: InspectedPayload,
        handler: HandlerId,
    ) -> ClassifiedEvent {
        ClassifiedEvent {
            event_id: self.event_id,
            marketplace: self.marketplace,
            event_type: inspected.event_type,
            marketplace_event_id: inspected.marketplace_event_id,
            handler,
            received_at: self.received_at,
            payload: inspected.payload,
        }
    }
}

/// Routing metadata read from a verified payload.
#[derive(Debug, Clone)]
pub struct InspectedPayload {
    /// Declared event type, empty when the marketplace sent none.
    pub event_type: String,
    /// Marketplace's own event identifier, used for idempotency.
    pub marketplace_event_id: Option<String>,
    /// Parsed body.
    pub payload: serde_json::Value,
}

/// A verified, classified event owned by its handler.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedEvent {
    /// Locally assigned identifier.
    pub event_id: Uuid,
    /// Source marketplace.
    pub marketplace: Marketplace,
    /// Declared event type.
    pub event_type: String,
    /// Marketplace's own event identifier.
    pub marketplace_event_id: Option<String>,
    /// Handler chosen by the classifier.
    pub handler: HandlerId,
    /// Receipt timestamp.
    pub received_at: DateTime<Utc>,
    /// Parsed body.
    pub payload: serde_json::Value,
}

/// Returns the first string (or number) value found under any of `keys`.
fn first_string(payload: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match payload.get(*key)? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
