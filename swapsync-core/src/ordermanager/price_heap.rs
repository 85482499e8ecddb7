//! Bounded per-collection window of the cheapest live listings.
//!
//! Keyed by `(price, order_id)` so the minimum (the floor) and the maximum
//! (the eviction candidate) are both at hand. The window holds at most
//! [`PRICE_HEAP_CAP`] entries; anything pricier than a full window is
//! rejected and recovered later through the database reload path.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Upper bound on entries per collection.
pub const PRICE_HEAP_CAP: usize = 100;

/// One live listing inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceEntry {
    pub order_id: String,
    pub collection_address: String,
    pub token_id: String,
    pub maker: String,
    pub price: Decimal,
}

/// Min-ordered price window for one collection.
#[derive(Debug, Default)]
pub struct PriceHeap {
    entries: BTreeMap<(Decimal, String), PriceEntry>,
}

impl PriceHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The floor: price of the cheapest entry.
    pub fn min_price(&self) -> Option<Decimal> {
        self.entries.keys().next().map(|(price, _)| *price)
    }

    fn max_key(&self) -> Option<(Decimal, String)> {
        self.entries.keys().next_back().cloned()
    }

    /// Admit a listing if the window has room or the price undercuts the
    /// current maximum, evicting the maximum when the cap is exceeded.
    /// Re-offering a known order id replaces the old entry.
    pub fn offer(&mut self, entry: PriceEntry) -> bool {
        let admit = self.entries.len() < PRICE_HEAP_CAP
            || self
                .max_key()
                .is_some_and(|(max_price, _)| entry.price < max_price);
        if !admit {
            return false;
        }
        self.entries
            .insert((entry.price, entry.order_id.clone()), entry);
        while self.entries.len() > PRICE_HEAP_CAP {
            if let Some(key) = self.max_key() {
                self.entries.remove(&key);
            }
        }
        true
    }

    /// Remove the entry for one order. Returns whether anything was removed.
    pub fn remove_order(&mut self, order_id: &str) -> bool {
        let key = self
            .entries
            .iter()
            .find(|(_, entry)| entry.order_id == order_id)
            .map(|(key, _)| key.clone());
        match key {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    /// Remove every listing of `token_id` placed by `maker`: after a sale
    /// the seller's remaining listings of that token are dead weight.
    pub fn remove_seller_listings(&mut self, maker: &str, token_id: &str) -> usize {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.maker == maker && entry.token_id == token_id)
            .map(|(key, _)| key.clone())
            .collect();
        let removed = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    fn contains_order(&self, order_id: &str) -> bool {
        self.entries.values().any(|entry| entry.order_id == order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(order_id: &str, price: i64) -> PriceEntry {
        PriceEntry {
            order_id: order_id.to_string(),
            collection_address: "0xc0ffee".to_string(),
            token_id: order_id.trim_start_matches("ord-").to_string(),
            maker: "0xmaker".to_string(),
            price: Decimal::from(price),
        }
    }

    #[test]
    fn cheaper_listing_moves_the_floor() {
        let mut heap = PriceHeap::new();
        for (id, price) in [("a", 10), ("b", 12), ("c", 15)] {
            assert!(heap.offer(entry(id, price)));
        }
        assert_eq!(heap.min_price(), Some(Decimal::from(10)));

        assert!(heap.offer(entry("d", 8)));
        assert_eq!(heap.len(), 4);
        assert_eq!(heap.min_price(), Some(Decimal::from(8)));
    }

    #[test]
    fn full_window_rejects_expensive_and_evicts_max_for_cheap() {
        let mut heap = PriceHeap::new();
        for i in 0..PRICE_HEAP_CAP {
            assert!(heap.offer(entry(&format!("ord-{i}"), 100 + i as i64)));
        }
        assert_eq!(heap.len(), PRICE_HEAP_CAP);

        // Pricier than the current max: rejected.
        assert!(!heap.offer(entry("pricey", 10_000)));
        assert_eq!(heap.len(), PRICE_HEAP_CAP);

        // Cheaper: admitted, the most expensive entry leaves.
        assert!(heap.offer(entry("cheap", 50)));
        assert_eq!(heap.len(), PRICE_HEAP_CAP);
        assert_eq!(heap.min_price(), Some(Decimal::from(50)));
        assert!(!heap.contains_order(&format!("ord-{}", PRICE_HEAP_CAP - 1)));
    }

    #[test]
    fn replayed_offer_does_not_duplicate() {
        let mut heap = PriceHeap::new();
        assert!(heap.offer(entry("a", 10)));
        assert!(heap.offer(entry("a", 10)));
        assert_eq!(heap.len(), 1);
    }

    #[test]
    fn remove_order_empties_window() {
        let mut heap = PriceHeap::new();
        heap.offer(entry("only", 10));
        assert!(heap.remove_order("only"));
        assert!(!heap.remove_order("only"));
        assert!(heap.is_empty());
        assert_eq!(heap.min_price(), None);
    }

    #[test]
    fn seller_listings_of_sold_token_are_pruned_together() {
        let mut heap = PriceHeap::new();
        let mut sold = entry("dup-1", 10);
        sold.token_id = "42".to_string();
        sold.maker = "0xseller".to_string();
        let mut dup = entry("dup-2", 11);
        dup.token_id = "42".to_string();
        dup.maker = "0xseller".to_string();
        let mut other = entry("other", 12);
        other.token_id = "43".to_string();
        other.maker = "0xseller".to_string();
        heap.offer(sold);
        heap.offer(dup);
        heap.offer(other);

        assert_eq!(heap.remove_seller_listings("0xseller", "42"), 2);
        assert_eq!(heap.len(), 1);
        assert!(heap.contains_order("other"));
    }

    #[test]
    fn equal_prices_coexist() {
        let mut heap = PriceHeap::new();
        assert!(heap.offer(entry("a", 10)));
        assert!(heap.offer(entry("b", 10)));
        assert_eq!(heap.len(), 2);
        assert!(heap.remove_order("a"));
        assert_eq!(heap.min_price(), Some(Decimal::from(10)));
    }
}
