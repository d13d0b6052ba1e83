//! Generic inbound webhook pipeline.
//!
//! One [`WebhookGateway`] serves every marketplace, parameterized by a
//! [`WebhookDescriptor`] per marketplace. A delivery moves through
//! `Received -> Verifying -> Verified -> Classified -> Dispatched ->
//! Acknowledged`, or ends in `Rejected`. The signature is checked against
//! the exact bytes received before anything parses them, and a delivery is
//! acknowledged only after the dispatcher has accepted it. Every delivery,
//! accepted or not, is appended to the Outcome Log.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode, header};
use chrono::Utc;
use uuid::Uuid;

use super::dispatcher::EventDispatcher;
use super::event_classifier::EventClassifier;
use super::signature_verifier::{self, SignatureAlgorithm, WebhookSecret};
use crate::domain::{
    HandlerId, Marketplace, OutcomeRecord, WebhookDisposition, WebhookEvent, WebhookOutcome,
};
use crate::persistence::OutcomeLog;

/// Header consulted when the body declares no event type.
pub const EVENT_TYPE_HEADER: &str = "x-event-type";

/// How one marketplace signs its deliveries.
#[derive(Debug, Clone)]
pub struct WebhookDescriptor {
    /// Marketplace the descriptor applies to.
    pub marketplace: Marketplace,
    /// Shared secret; deliveries are rejected while it is unset.
    pub secret: Option<WebhookSecret>,
    /// Signature encoding.
    pub algorithm: SignatureAlgorithm,
    /// Header carrying the signature.
    pub signature_header: String,
}

/// Final answer for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReceipt {
    /// Verified, classified and accepted for processing.
    Acknowledged {
        /// Local event id.
        event_id: Uuid,
        /// Handler the event was routed to.
        handler: HandlerId,
    },
    /// Signature check failed.
    Rejected {
        /// Local event id.
        event_id: Uuid,
        /// Why verification failed.
        reason: String,
    },
    /// Signature valid but the body is not usable JSON.
    Malformed {
        /// Local event id.
        event_id: Uuid,
        /// Parse or content-type error.
        reason: String,
    },
    /// The event could not be handed off; the marketplace should redeliver.
    Unavailable {
        /// Local event id.
        event_id: Uuid,
        /// Dispatch error.
        reason: String,
    },
}

impl WebhookReceipt {
    /// HTTP status returned to the marketplace.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Acknowledged { .. } => StatusCode::OK,
            Self::Rejected { .. } => StatusCode::UNAUTHORIZED,
            Self::Malformed { .. } => StatusCode::BAD_REQUEST,
            Self::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Local event id.
    #[must_use]
    pub const fn event_id(&self) -> Uuid {
        match self {
            Self::Acknowledged { event_id, .. }
            | Self::Rejected { event_id, .. }
            | Self::Malformed { event_id, .. }
            | Self::Unavailable { event_id, .. } => *event_id,
        }
    }
}

/// The marketplace has no webhook descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("webhooks are not configured for {0}")]
pub struct MarketplaceNotConfigured(pub Marketplace);

/// Verifies, classifies and dispatches inbound webhooks.
#[derive(Debug, Clone)]
pub struct WebhookGateway {
    descriptors: Arc<HashMap<Marketplace, WebhookDescriptor>>,
    classifier: Arc<EventClassifier>,
    dispatcher: Arc<dyn EventDispatcher>,
    outcome_log: Arc<dyn OutcomeLog>,
}

impl WebhookGateway {
    /// Creates a gateway.
    #[must_use]
    pub fn new(
        descriptors: impl IntoIterator<Item = WebhookDescriptor>,
        classifier: EventClassifier,
        dispatcher: Arc<dyn EventDispatcher>,
        outcome_log: Arc<dyn OutcomeLog>,
    ) -> Self {
        Self {
            descriptors: Arc::new(
                descriptors
                    .into_iter()
                    .map(|d| (d.marketplace, d))
                    .collect(),
            ),
            classifier: Arc::new(classifier),
            dispatcher,
            outcome_log,
        }
    }

    /// Handles one delivery for `marketplace`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketplaceNotConfigured`] when the marketplace has no
    /// descriptor. Every other outcome is a [`WebhookReceipt`].
    pub async fn receive(
        &self,
        marketplace: Marketplace,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<WebhookReceipt, MarketplaceNotConfigured> {
        let descriptor = self
            .descriptors
            .get(&marketplace)
            .ok_or(MarketplaceNotConfigured(marketplace))?;

        let mut event = WebhookEvent::new(marketplace, body, Utc::now());
        let mut outcome = WebhookOutcome {
            event_id: event.event_id(),
            marketplace,
            event_type: None,
            marketplace_event_id: None,
            received_at: event.received_at(),
            signature_valid: false,
            payload_bytes: event.raw_payload().len(),
            disposition: WebhookDisposition::Rejected {
                reason: String::new(),
            },
        };

        let provided = header_str(headers, &descriptor.signature_header);
        let valid = signature_verifier::verify(
            descriptor.secret.as_ref(),
            event.raw_payload(),
            provided,
            descriptor.algorithm,
        );
        if let Err(e) = event.record_verification(valid) {
            tracing::error!(
                event_id = %event.event_id(),
                error = %e,
                "verification recorded twice"
            );
        }
        outcome.signature_valid = valid;

        if !valid {
            let reason = rejection_reason(descriptor, provided, event.raw_payload());
            tracing::warn!(
                event_id = %event.event_id(),
                %marketplace,
                reason,
                "webhook signature rejected"
            );
            let receipt = WebhookReceipt::Rejected {
                event_id: event.event_id(),
                reason: reason.to_string(),
            };
            outcome.disposition = WebhookDisposition::Rejected {
                reason: reason.to_string(),
            };
            self.record(outcome).await;
            return Ok(receipt);
        }

        let event_type = header_str(headers, EVENT_TYPE_HEADER);
        let inspected = check_content_type(headers)
            .and_then(|()| event.inspect(event_type).map_err(|e| e.to_string()));
        let inspected = match inspected {
            Ok(inspected) => inspected,
            Err(reason) => {
                tracing::warn!(
                    event_id = %event.event_id(),
                    %marketplace,
                    %reason,
                    "malformed webhook body"
                );
                outcome.disposition = WebhookDisposition::Malformed {
                    reason: reason.clone(),
                };
                self.record(outcome).await;
                return Ok(WebhookReceipt::Malformed {
                    event_id: event.event_id(),
                    reason,
                });
            }
        };

        let classification = self.classifier.classify(marketplace, &inspected.event_type);
        let handler = classification.handler();
        if classification.is_unknown() {
            tracing::warn!(
                event_id = %event.event_id(),
                %marketplace,
                event_type = %inspected.event_type,
                "unmapped webhook event type acknowledged"
            );
        }
        outcome.event_type = Some(inspected.event_type.clone());
        outcome.marketplace_event_id = inspected.marketplace_event_id.clone();

        let event_id = event.event_id();
        let classified = event.into_classified(inspected, handler);
        let receipt = match self.dispatcher.dispatch(classified).await {
            Ok(()) => {
                outcome.disposition = WebhookDisposition::Processed {
                    handler,
                    unknown_event_type: classification.is_unknown(),
                };
                tracing::info!(
                    %event_id,
                    %marketplace,
                    event_type = outcome.event_type.as_deref().unwrap_or(""),
                    handler = handler.as_str(),
                    "webhook acknowledged"
                );
                WebhookReceipt::Acknowledged { event_id, handler }
            }
            Err(e) => {
                tracing::error!(%event_id, %marketplace, error = %e, "webhook dispatch failed");
                outcome.disposition = WebhookDisposition::DispatchFailed {
                    reason: e.to_string(),
                };
                WebhookReceipt::Unavailable {
                    event_id,
                    reason: e.to_string(),
                }
            }
        };

        self.record(outcome).await;
        Ok(receipt)
    }

    /// Configured descriptors, in no particular order.
    pub fn descriptors(&self) -> impl Iterator<Item = &WebhookDescriptor> {
        self.descriptors.values()
    }

    async fn record(&self, outcome: WebhookOutcome) {
        let event_id = outcome.event_id;
        if let Err(e) = self.outcome_log.record(OutcomeRecord::Webhook(outcome)).await {
            tracing::error!(%event_id, error = %e, "failed to record webhook outcome");
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Accepts a missing content type; rejects an explicit non-JSON one.
fn check_content_type(headers: &HeaderMap) -> Result<(), String> {
    let Some(value) = header_str(headers, header::CONTENT_TYPE.as_str()) else {
        return Ok(());
    };
    let mime = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if mime == "application/json" || mime.ends_with("+json") {
        Ok(())
    } else {
        Err(format!("unsupported content type: {mime}"))
    }
}

fn rejection_reason(
    descriptor: &WebhookDescriptor,
    provided: Option<&str>,
    payload: &[u8],
) -> &'static str {
    if descriptor.secret.is_none() {
        "webhook secret not configured"
    } else if provided.is_none() {
        "missing signature header"
    } else if payload.is_empty() {
        "empty payload"
    } else {
        "signature mismatch"
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use axum::http::HeaderValue;

    use super::*;
    use crate::domain::{ClassifiedEvent, OutcomeQuery};
    use crate::persistence::InMemoryOutcomeLog;
    use crate::service::dispatcher::DispatchError;

    const SECRET: &str = "trendyol-secret";

    #[derive(Debug, Default)]
    struct CountingDispatcher {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl EventDispatcher for CountingDispatcher {
        async fn dispatch(&self, _event: ClassifiedEvent) -> Result<(), DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(DispatchError::Closed)
            } else {
                Ok(())
            }
        }
    }

    fn secret() -> WebhookSecret {
        let Some(s) = WebhookSecret::new(SECRET) else {
            panic!("non-empty secret");
        };
        s
    }

    fn gateway(
        dispatcher: Arc<CountingDispatcher>,
        log: Arc<InMemoryOutcomeLog>,
    ) -> WebhookGateway {
        WebhookGateway::new(
            [
                WebhookDescriptor {
                    marketplace: Marketplace::Trendyol,
                    secret: Some(secret()),
                    algorithm: SignatureAlgorithm::HmacSha256Hex,
                    signature_header: "X-Trendyol-Signature".to_string(),
                },
                WebhookDescriptor {
                    marketplace: Marketplace::Amazon,
                    secret: None,
                    algorithm: SignatureAlgorithm::HmacSha256Base64,
                    signature_header: "X-Amazon-Signature".to_string(),
                },
            ],
            EventClassifier::default(),
            dispatcher,
            log,
        )
    }

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let sig = signature_verifier::sign(&secret(), body, SignatureAlgorithm::HmacSha256Hex);
        let mut headers = HeaderMap::new();
        if let Ok(v) = HeaderValue::from_str(&sig) {
            headers.insert("x-trendyol-signature", v);
        }
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    async fn entries(log: &InMemoryOutcomeLog) -> Vec<crate::domain::OutcomeEntry> {
        let Ok(entries) = log.query(&OutcomeQuery::default()).await else {
            panic!("query failed");
        };
        entries
    }

    #[tokio::test]
    async fn valid_delivery_is_acknowledged_and_dispatched_once() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let gw = gateway(Arc::clone(&dispatcher), Arc::clone(&log));

        let body = br#"{"event_type":"ORDER_CREATED","id":"ty-1"}"#;
        let Ok(receipt) = gw
            .receive(Marketplace::Trendyol, &signed_headers(body), Bytes::from_static(body))
            .await
        else {
            panic!("marketplace configured");
        };

        assert_eq!(receipt.status_code(), StatusCode::OK);
        assert!(matches!(
            receipt,
            WebhookReceipt::Acknowledged {
                handler: HandlerId::OrderCreated,
                ..
            }
        ));
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);

        let logged = entries(&log).await;
        let Some(OutcomeRecord::Webhook(outcome)) = logged.first().map(|e| &e.record) else {
            panic!("missing webhook outcome");
        };
        assert!(outcome.signature_valid);
        assert_eq!(outcome.marketplace_event_id.as_deref(), Some("ty-1"));
    }

    #[tokio::test]
    async fn tampered_payload_is_rejected_without_dispatch() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let gw = gateway(Arc::clone(&dispatcher), Arc::clone(&log));

        let original = br#"{"event_type":"ORDER_CREATED","total":100}"#;
        let tampered = br#"{"event_type":"ORDER_CREATED","total":999}"#;
        let Ok(receipt) = gw
            .receive(
                Marketplace::Trendyol,
                &signed_headers(original),
                Bytes::from_static(tampered),
            )
            .await
        else {
            panic!("marketplace configured");
        };

        assert_eq!(receipt.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);

        let logged = entries(&log).await;
        let Some(OutcomeRecord::Webhook(outcome)) = logged.first().map(|e| &e.record) else {
            panic!("missing webhook outcome");
        };
        assert!(!outcome.signature_valid);
        assert_eq!(outcome.event_type, None, "rejected payload is not interpreted");
    }

    #[tokio::test]
    async fn missing_secret_rejects_everything() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let gw = gateway(Arc::clone(&dispatcher), Arc::new(InMemoryOutcomeLog::new(10)));
        let Ok(receipt) = gw
            .receive(Marketplace::Amazon, &HeaderMap::new(), Bytes::from_static(b"{}"))
            .await
        else {
            panic!("marketplace configured");
        };
        assert_eq!(
            receipt,
            WebhookReceipt::Rejected {
                event_id: receipt.event_id(),
                reason: "webhook secret not configured".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn non_json_body_is_malformed_after_verification() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let gw = gateway(Arc::clone(&dispatcher), Arc::clone(&log));

        let body = b"event=ORDER_CREATED";
        let Ok(receipt) = gw
            .receive(Marketplace::Trendyol, &signed_headers(body), Bytes::from_static(body))
            .await
        else {
            panic!("marketplace configured");
        };
        assert_eq!(receipt.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);

        let logged = entries(&log).await;
        let Some(entry) = logged.first() else {
            panic!("missing outcome");
        };
        assert_eq!(entry.record.status_str(), "malformed");
    }

    #[tokio::test]
    async fn non_json_content_type_is_malformed() {
        let gw = gateway(
            Arc::new(CountingDispatcher::default()),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let body = br#"{"event_type":"ORDER_CREATED"}"#;
        let mut headers = signed_headers(body);
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        let Ok(receipt) = gw
            .receive(Marketplace::Trendyol, &headers, Bytes::from_static(body))
            .await
        else {
            panic!("marketplace configured");
        };
        assert_eq!(receipt.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let gw = gateway(
            Arc::new(CountingDispatcher::default()),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let body = br#"{"event_type":"BRAND_NEW_EVENT"}"#;
        let Ok(receipt) = gw
            .receive(Marketplace::Trendyol, &signed_headers(body), Bytes::from_static(body))
            .await
        else {
            panic!("marketplace configured");
        };
        assert!(matches!(
            receipt,
            WebhookReceipt::Acknowledged {
                handler: HandlerId::LogAndAcknowledge,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn event_type_header_is_used_as_fallback() {
        let gw = gateway(
            Arc::new(CountingDispatcher::default()),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let body = br#"{"orderNumber":"42"}"#;
        let mut headers = signed_headers(body);
        headers.insert(EVENT_TYPE_HEADER, HeaderValue::from_static("ORDER_CANCELLED"));
        let Ok(receipt) = gw
            .receive(Marketplace::Trendyol, &headers, Bytes::from_static(body))
            .await
        else {
            panic!("marketplace configured");
        };
        assert!(matches!(
            receipt,
            WebhookReceipt::Acknowledged {
                handler: HandlerId::OrderCancelled,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn dispatch_failure_is_service_unavailable() {
        let dispatcher = Arc::new(CountingDispatcher {
            fail: true,
            ..CountingDispatcher::default()
        });
        let log = Arc::new(InMemoryOutcomeLog::new(10));
        let gw = gateway(dispatcher, Arc::clone(&log));
        let body = br#"{"event_type":"ORDER_CREATED"}"#;
        let Ok(receipt) = gw
            .receive(Marketplace::Trendyol, &signed_headers(body), Bytes::from_static(body))
            .await
        else {
            panic!("marketplace configured");
        };
        assert_eq!(receipt.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let logged = entries(&log).await;
        let Some(entry) = logged.first() else {
            panic!("missing outcome");
        };
        assert_eq!(entry.record.status_str(), "dispatch_failed");
    }

    #[tokio::test]
    async fn unconfigured_marketplace_is_an_error() {
        let gw = gateway(
            Arc::new(CountingDispatcher::default()),
            Arc::new(InMemoryOutcomeLog::new(10)),
        );
        let result = gw
            .receive(Marketplace::Ozon, &HeaderMap::new(), Bytes::from_static(b"{}"))
            .await;
        assert_eq!(result, Err(MarketplaceNotConfigured(Marketplace::Ozon)));
    }
}
