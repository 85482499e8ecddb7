//! Queue message definitions.
//!
//! Both messages travel through Redis as JSON, so field names here are the
//! wire format shared with any other consumer of the queues.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A state change relevant to floor computation, published by the indexer
/// and the listing/expiry workers, consumed only by the floor-price engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TradeEvent {
    /// A new order reached the book.
    Listing {
        order_id: String,
        collection_addr: String,
        token_id: String,
        maker: String,
        price: Decimal,
    },
    /// A sale: `from` sold the token to `to`.
    Buy {
        order_id: String,
        collection_addr: String,
        token_id: String,
        from: String,
        to: String,
    },
    /// The maker withdrew the order.
    Cancel {
        order_id: String,
        collection_addr: String,
        token_id: String,
    },
    /// The order passed its expiry time.
    Expired {
        order_id: String,
        collection_addr: String,
        token_id: String,
    },
    /// Force a floor recompute for one collection.
    UpdateCollection { collection_addr: String },
}

impl TradeEvent {
    /// The collection this event belongs to.
    pub fn collection_addr(&self) -> &str {
        match self {
            TradeEvent::Listing { collection_addr, .. }
            | TradeEvent::Buy { collection_addr, .. }
            | TradeEvent::Cancel { collection_addr, .. }
            | TradeEvent::Expired { collection_addr, .. }
            | TradeEvent::UpdateCollection { collection_addr } => collection_addr,
        }
    }
}

/// A freshly indexed order waiting for the listing worker, which either
/// expires it immediately or hands it to the timer wheel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub order_id: String,
    pub collection_address: String,
    pub token_id: String,
    pub price: Decimal,
    pub maker: String,
    /// Unix seconds; zero means the order never expires.
    pub expire_time: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn trade_event_wire_format_is_tagged() {
        let event = TradeEvent::Buy {
            order_id: "0xabc".to_string(),
            collection_addr: "0xc0ffee".to_string(),
            token_id: "7".to_string(),
            from: "0xseller".to_string(),
            to: "0xbuyer".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "buy");
        assert_eq!(json["order_id"], "0xabc");
        assert_eq!(json["from"], "0xseller");

        let back: TradeEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn listing_price_serializes_as_decimal_string() {
        let event = TradeEvent::Listing {
            order_id: "0x01".to_string(),
            collection_addr: "0xc0ffee".to_string(),
            token_id: "1".to_string(),
            maker: "0xmaker".to_string(),
            price: Decimal::new(1_500_000, 2),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"listing\""));
        assert!(json.contains("15000.00"));
    }

    #[test]
    fn update_collection_has_no_order_fields() {
        let json = r#"{"event_type":"update_collection","collection_addr":"0xc0ffee"}"#;
        let event: TradeEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.collection_addr(), "0xc0ffee");
    }
}
