//! Event-type to handler mapping.
//!
//! Every marketplace has an explicit table from its own event names to a
//! [`HandlerId`]. Tables ship with the names each marketplace documents and
//! can be extended per deployment. Lookups ignore ASCII case and
//! surrounding whitespace. Anything not in the table is
//! [`Classification::Unknown`] and ends up at
//! [`HandlerId::LogAndAcknowledge`].

use std::collections::HashMap;

use crate::domain::{HandlerId, Marketplace};

/// Result of classifying one event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The table has an entry for the event type.
    Mapped(HandlerId),
    /// No entry; the event is logged and acknowledged.
    Unknown,
}

impl Classification {
    /// Handler the event is routed to.
    #[must_use]
    pub const fn handler(self) -> HandlerId {
        match self {
            Self::Mapped(handler) => handler,
            Self::Unknown => HandlerId::LogAndAcknowledge,
        }
    }

    /// `true` for [`Classification::Unknown`].
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Immutable per-marketplace mapping tables.
#[derive(Debug, Clone)]
pub struct EventClassifier {
    tables: HashMap<Marketplace, HashMap<String, HandlerId>>,
}

impl EventClassifier {
    /// Builds the classifier from the built-in tables plus `extensions`.
    /// An extension entry replaces a built-in entry with the same name.
    #[must_use]
    pub fn new(
        extensions: impl IntoIterator<Item = (Marketplace, Vec<(String, HandlerId)>)>,
    ) -> Self {
        let mut tables: HashMap<Marketplace, HashMap<String, HandlerId>> = Marketplace::ALL
            .into_iter()
            .map(|m| {
                let table = builtin_table(m)
                    .iter()
                    .map(|(name, handler)| (normalize(name), *handler))
                    .collect();
                (m, table)
            })
            .collect();

        for (marketplace, entries) in extensions {
            let table = tables.entry(marketplace).or_default();
            for (name, handler) in entries {
                table.insert(normalize(&name), handler);
            }
        }

        Self { tables }
    }

    /// Classifies `event_type` as declared by `marketplace`.
    #[must_use]
    pub fn classify(&self, marketplace: Marketplace, event_type: &str) -> Classification {
        let key = normalize(event_type);
        if key.is_empty() {
            return Classification::Unknown;
        }
        self.tables
            .get(&marketplace)
            .and_then(|table| table.get(&key))
            .map_or(Classification::Unknown, |handler| {
                Classification::Mapped(*handler)
            })
    }

    /// Number of mapped event types for `marketplace`.
    #[must_use]
    pub fn mapped_count(&self, marketplace: Marketplace) -> usize {
        self.tables.get(&marketplace).map_or(0, HashMap::len)
    }
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::new([])
    }
}

fn normalize(event_type: &str) -> String {
    event_type.trim().to_ascii_lowercase()
}

fn builtin_table(marketplace: Marketplace) -> &'static [(&'static str, HandlerId)] {
    use HandlerId as H;
    match marketplace {
        Marketplace::Trendyol => &[
            ("ORDER_CREATED", H::OrderCreated),
            ("ORDER_STATUS_CHANGED", H::OrderUpdated),
            ("ORDER_CANCELLED", H::OrderCancelled),
            ("ORDER_RETURNED", H::OrderRefunded),
            ("SHIPMENT_PACKAGE_STATUS_CHANGED", H::ShipmentUpdated),
            ("PRODUCT_STOCK_UPDATED", H::StockChanged),
            ("PRODUCT_PRICE_UPDATED", H::PriceChanged),
            ("PRODUCT_APPROVED", H::ListingApproved),
            ("PRODUCT_REJECTED", H::ListingRejected),
            ("CLAIM_CREATED", H::ReturnRequested),
            ("QUESTION_CREATED", H::QuestionReceived),
        ],
        Marketplace::Amazon => &[
            ("ORDER_CHANGE", H::OrderUpdated),
            ("ORDER_STATUS_CHANGE", H::OrderUpdated),
            ("FBA_INVENTORY_AVAILABILITY_CHANGES", H::StockChanged),
            ("ITEM_INVENTORY_EVENT_CHANGE", H::StockChanged),
            ("ANY_OFFER_CHANGED", H::PriceChanged),
            ("PRICING_HEALTH", H::PriceChanged),
            ("LISTINGS_ITEM_STATUS_CHANGE", H::ProductStatusChanged),
            ("LISTINGS_ITEM_ISSUES_CHANGE", H::ListingRejected),
        ],
        Marketplace::Ebay => &[
            ("FixedPriceTransaction", H::OrderCreated),
            ("AuctionCheckoutComplete", H::PaymentCompleted),
            ("BuyerCancelRequested", H::OrderCancelled),
            ("ItemMarkedShipped", H::ShipmentUpdated),
            ("ItemRevised", H::ProductStatusChanged),
            ("ReturnCreated", H::ReturnRequested),
            ("AskSellerQuestion", H::QuestionReceived),
            ("FeedbackReceived", H::ReviewReceived),
        ],
        Marketplace::N11 => &[
            ("ORDER_CREATED", H::OrderCreated),
            ("ORDER_UPDATED", H::OrderUpdated),
            ("ORDER_CANCELLED", H::OrderCancelled),
            ("ORDER_SHIPPED", H::ShipmentUpdated),
            ("PRODUCT_STOCK_UPDATED", H::StockChanged),
            ("PRODUCT_PRICE_UPDATED", H::PriceChanged),
            ("PRODUCT_APPROVED", H::ListingApproved),
            ("PRODUCT_REJECTED", H::ListingRejected),
        ],
        Marketplace::Hepsiburada => &[
            ("order.created", H::OrderCreated),
            ("order.status.changed", H::OrderUpdated),
            ("order.cancelled", H::OrderCancelled),
            ("order.refunded", H::OrderRefunded),
            ("product.stock.changed", H::StockChanged),
            ("product.price.changed", H::PriceChanged),
            ("product.status.changed", H::ProductStatusChanged),
            ("listing.approved", H::ListingApproved),
            ("listing.rejected", H::ListingRejected),
            ("campaign.started", H::CampaignChanged),
            ("campaign.ended", H::CampaignChanged),
            ("return.request.created", H::ReturnRequested),
            ("return.request.approved", H::ReturnRequested),
            ("question.received", H::QuestionReceived),
            ("review.received", H::ReviewReceived),
        ],
        Marketplace::Ozon => &[
            ("TYPE_NEW_POSTING", H::OrderCreated),
            ("TYPE_STATE_CHANGED", H::OrderUpdated),
            ("TYPE_POSTING_CANCELLED", H::OrderCancelled),
            ("TYPE_CUTOFF_DATE_CHANGED", H::ShipmentUpdated),
            ("TYPE_DELIVERY_DATE_CHANGED", H::ShipmentUpdated),
            ("TYPE_STOCKS_CHANGED", H::StockChanged),
            ("TYPE_PRICE_INDEX_CHANGED", H::PriceChanged),
            ("TYPE_CREATE_OR_UPDATE_ITEM", H::ProductStatusChanged),
            ("TYPE_NEW_MESSAGE", H::QuestionReceived),
        ],
        Marketplace::Allegro => &[
            ("BOUGHT", H::OrderCreated),
            ("FILLED_IN", H::OrderUpdated),
            ("READY_FOR_PROCESSING", H::PaymentCompleted),
            ("BUYER_CANCELLED", H::OrderCancelled),
            ("OFFER_STOCK_CHANGED", H::StockChanged),
            ("OFFER_PRICE_CHANGED", H::PriceChanged),
            ("OFFER_ACTIVATED", H::ListingApproved),
            ("OFFER_ENDED", H::ProductStatusChanged),
        ],
        Marketplace::Tokopedia => &[
            ("order_notification", H::OrderCreated),
            ("order_status", H::OrderUpdated),
            ("order_cancellation", H::OrderCancelled),
            ("product_creation", H::ProductStatusChanged),
            ("product_changes", H::ProductStatusChanged),
            ("webhook_chat", H::QuestionReceived),
        ],
        Marketplace::Pazarama => &[
            ("order_created", H::OrderCreated),
            ("order_updated", H::OrderUpdated),
            ("order_cancelled", H::OrderCancelled),
            ("product_approved", H::ListingApproved),
            ("product_rejected", H::ListingRejected),
            ("inventory_updated", H::StockChanged),
            ("payment_completed", H::PaymentCompleted),
        ],
    }
}
