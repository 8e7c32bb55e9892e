//! Order Store
//!
//! One price-ordered collection per ticker. Insertion keeps ascending price
//! order, and equal prices keep insertion order, which is the tie-break the
//! matcher relies on.
//!
//! Lookup and update are two separate steps. Nothing runs between them while a
//! caller holds the store, since a peer only mutates it from synchronous code on
//! a single scheduler. An `update` on an id that vanished is still reported as
//! `OrderNotFound` rather than silently ignored.

use crate::engine::entry::{Order, OrderPatch, OrderStatus, TickerSet};
use crate::engine::errors::EngineError;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct OrderStore {
    orders: BTreeMap<String, Vec<Order>>, // ticker -> orders by ascending price
}

impl OrderStore {
    /// Creates a store with an empty collection for every supported ticker
    pub fn new(tickers: &TickerSet) -> Self {
        Self {
            orders: tickers.iter().map(|t| (t.to_string(), Vec::new())).collect(),
        }
    }

    /// Inserts after every order with a price lower than or equal to the new one
    pub fn insert(&mut self, order: Order) -> Result<(), EngineError> {
        let orders = self
            .orders
            .get_mut(&order.ticker)
            .ok_or_else(|| EngineError::UnknownTicker(order.ticker.clone()))?;
        let index = orders.partition_point(|o| o.price <= order.price);
        orders.insert(index, order);
        Ok(())
    }

    pub fn find(&self, ticker: &str, id: &str) -> Option<&Order> {
        self.orders.get(ticker)?.iter().find(|o| o.id == id)
    }

    pub fn update(&mut self, ticker: &str, id: &str, patch: OrderPatch) -> Result<(), EngineError> {
        let order = self
            .orders
            .get_mut(ticker)
            .and_then(|orders| orders.iter_mut().find(|o| o.id == id))
            .ok_or_else(|| EngineError::OrderNotFound {
                ticker: ticker.to_string(),
                id: id.to_string(),
            })?;
        patch.apply_to(order);
        Ok(())
    }

    /// Removes every closed order of the ticker, returns how many were removed
    pub fn sweep(&mut self, ticker: &str) -> usize {
        match self.orders.get_mut(ticker) {
            Some(orders) => {
                let before = orders.len();
                orders.retain(|o| o.status != OrderStatus::Closed);
                before - orders.len()
            }
            None => 0,
        }
    }

    /// Reopens locked orders whose expiry is at or before `now_ms`
    pub fn release_expired_locks(&mut self, ticker: &str, now_ms: u64) -> usize {
        let Some(orders) = self.orders.get_mut(ticker) else {
            return 0;
        };
        let mut released = 0;
        for order in orders.iter_mut() {
            if order.status != OrderStatus::Locked {
                continue;
            }
            if matches!(order.lock_expires_at, Some(at) if at <= now_ms) {
                order.status = OrderStatus::Open;
                order.lock_expires_at = None;
                released += 1;
            }
        }
        released
    }

    /// Orders of a ticker in ascending price order
    pub fn orders(&self, ticker: &str) -> &[Order] {
        self.orders.get(ticker).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.orders.keys().map(String::as_str)
    }

    pub fn len(&self, ticker: &str) -> usize {
        self.orders(ticker).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::entry::OrderSide;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn order(price: Decimal, owner: &str) -> Order {
        Order::new(
            "btc-usd".to_string(),
            OrderSide::Sell,
            price,
            dec!(1),
            owner.to_string(),
        )
    }

    fn store() -> OrderStore {
        OrderStore::new(&TickerSet::default())
    }

    #[test]
    fn starts_with_an_empty_collection_per_ticker() {
        let store = store();
        let tickers: Vec<&str> = store.tickers().collect();
        assert_eq!(tickers, vec!["btc-usd", "eth-usd", "xau-usd"]);
        assert!(tickers.iter().all(|t| store.len(t) == 0));
    }

    #[test]
    fn insert_keeps_ascending_price() {
        let mut store = store();
        for price in [dec!(105), dec!(99), dec!(120), dec!(100), dec!(99.5)] {
            store.insert(order(price, "A")).unwrap();
        }
        let prices: Vec<Decimal> = store.orders("btc-usd").iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![dec!(99), dec!(99.5), dec!(100), dec!(105), dec!(120)]);
    }

    #[test]
    fn equal_prices_keep_insertion_order() {
        let mut store = store();
        store.insert(order(dec!(100), "first")).unwrap();
        store.insert(order(dec!(90), "low")).unwrap();
        store.insert(order(dec!(100), "second")).unwrap();
        let owners: Vec<&str> = store
            .orders("btc-usd")
            .iter()
            .map(|o| o.owner_id.as_str())
            .collect();
        assert_eq!(owners, vec!["low", "first", "second"]);
    }

    #[test]
    fn insert_rejects_unknown_ticker() {
        let mut store = store();
        let mut o = order(dec!(1), "A");
        o.ticker = "doge-usd".to_string();
        assert_eq!(
            store.insert(o),
            Err(EngineError::UnknownTicker("doge-usd".to_string()))
        );
    }

    #[test]
    fn update_replaces_only_given_fields() {
        let mut store = store();
        let o = order(dec!(100), "A");
        let id = o.id.clone();
        store.insert(o).unwrap();

        store
            .update("btc-usd", &id, OrderPatch::status(OrderStatus::Locked))
            .unwrap();
        let found = store.find("btc-usd", &id).unwrap();
        assert_eq!(found.status, OrderStatus::Locked);
        assert_eq!(found.quantity, dec!(1));
        assert_eq!(found.price, dec!(100));
    }

    #[test]
    fn update_of_missing_order_fails() {
        let mut store = store();
        let err = store
            .update("btc-usd", "nope", OrderPatch::status(OrderStatus::Closed))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::OrderNotFound {
                ticker: "btc-usd".to_string(),
                id: "nope".to_string()
            }
        );
    }

    #[test]
    fn sweep_removes_closed_orders_once() {
        let mut store = store();
        let keep = order(dec!(100), "A");
        let gone = order(dec!(101), "B");
        let gone_id = gone.id.clone();
        store.insert(keep).unwrap();
        store.insert(gone).unwrap();
        store
            .update("btc-usd", &gone_id, OrderPatch::status(OrderStatus::Closed))
            .unwrap();

        assert_eq!(store.sweep("btc-usd"), 1);
        assert_eq!(store.sweep("btc-usd"), 0);
        assert_eq!(store.len("btc-usd"), 1);
        assert!(store.find("btc-usd", &gone_id).is_none());
    }

    #[test]
    fn releases_only_expired_locks() {
        let mut store = store();
        let expired = order(dec!(100), "A");
        let fresh = order(dec!(100), "B");
        let (expired_id, fresh_id) = (expired.id.clone(), fresh.id.clone());
        store.insert(expired).unwrap();
        store.insert(fresh).unwrap();
        store
            .update(
                "btc-usd",
                &expired_id,
                OrderPatch::status(OrderStatus::Locked).with_lock_expiry(Some(1_000)),
            )
            .unwrap();
        store
            .update(
                "btc-usd",
                &fresh_id,
                OrderPatch::status(OrderStatus::Locked).with_lock_expiry(Some(5_000)),
            )
            .unwrap();

        assert_eq!(store.release_expired_locks("btc-usd", 2_000), 1);
        assert_eq!(store.find("btc-usd", &expired_id).unwrap().status, OrderStatus::Open);
        assert_eq!(store.find("btc-usd", &fresh_id).unwrap().status, OrderStatus::Locked);
    }
}
