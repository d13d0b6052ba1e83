//! Webhook acknowledgement body.

use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::HandlerId;
use crate::service::WebhookReceipt;

/// Response body for `POST /webhooks/{marketplace}`.
///
/// `status` is `processed` when the delivery was accepted and `rejected`
/// otherwise; the HTTP status tells the marketplace whether to redeliver.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WebhookResponse {
    /// `processed` or `rejected`.
    pub status: &'static str,
    /// Local identifier of the delivery, as recorded in the Outcome Log.
    pub event_id: Uuid,
    /// Handler the event was routed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler: Option<HandlerId>,
    /// Why the delivery was not accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<WebhookReceipt> for WebhookResponse {
    fn from(receipt: WebhookReceipt) -> Self {
        match receipt {
            WebhookReceipt::Acknowledged { event_id, handler } => Self {
                status: "processed",
                event_id,
                handler: Some(handler),
                reason: None,
            },
            WebhookReceipt::Rejected { event_id, reason }
            | WebhookReceipt::Malformed { event_id, reason }
            | WebhookReceipt::Unavailable { event_id, reason } => Self {
                status: "rejected",
                event_id,
                handler: None,
                reason: Some(reason),
            },
        }
    }
}
