//! Match Engine Module
//!
//! Facade over one peer's order store. Every method here is synchronous and
//! finishes its mutation before returning, so callers on the peer's scheduler
//! never observe a half-applied settlement. The `status` field of stored
//! orders is the only concurrency control between interleaved submissions.

pub use super::entry::{MatchResult, Order, OrderStatus, TickerSet};

use super::data::OrderStore;
use super::errors::EngineError;
use super::matchlogic::{self, SettlementReport};
use rust_decimal::Decimal;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Counts from one sweep pass over every ticker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub released: usize,
}

/// The main match engine implementation
/// Owns the order store of a single peer
#[derive(Debug, Clone)]
pub struct MatchEngine {
    /// Identity reported as `origin_peer` in match results
    peer_name: String,
    tickers: TickerSet,
    store: OrderStore,
    /// When set, locks carry an expiry and the sweep reopens expired ones
    lock_ttl: Option<Duration>,
}

impl MatchEngine {
    pub fn new(peer_name: impl Into<String>, tickers: TickerSet) -> MatchEngine {
        MatchEngine {
            peer_name: peer_name.into(),
            store: OrderStore::new(&tickers),
            tickers,
            lock_ttl: None,
        }
    }

    pub fn with_lock_ttl(mut self, lock_ttl: Option<Duration>) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }

    pub fn peer_name(&self) -> &str {
        &self.peer_name
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub fn validate(&self, order: &Order) -> Result<(), EngineError> {
        if !self.tickers.contains(&order.ticker) {
            return Err(EngineError::UnknownTicker(order.ticker.clone()));
        }
        if order.price <= Decimal::ZERO {
            return Err(EngineError::InvalidPrice(order.price));
        }
        if order.quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(order.quantity));
        }
        Ok(())
    }

    pub fn match_locally(&self, order: &Order) -> MatchResult {
        matchlogic::match_locally(&self.store, order, &self.peer_name)
    }

    /// Finalizes a match against this store
    pub fn close(&mut self, ticker: &str, result: &MatchResult) -> Result<SettlementReport, EngineError> {
        matchlogic::apply(&mut self.store, OrderStatus::Closed, ticker, result, None)
    }

    /// Reserves the matched orders for a remote peer
    pub fn lock(&mut self, ticker: &str, result: &MatchResult) -> Result<SettlementReport, EngineError> {
        let expires_at = self.lock_ttl.map(|ttl| {
            let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
            now_millis().saturating_add(ttl_ms)
        });
        matchlogic::apply(&mut self.store, OrderStatus::Locked, ticker, result, expires_at)
    }

    /// Announce handler: matches a remote order and pre-locks what was found.
    /// Returns `None` when nothing here can fill it.
    pub fn on_announce(&mut self, order: &Order) -> Result<Option<MatchResult>, EngineError> {
        if let Err(e) = self.validate(order) {
            log::warn!("Ignoring announced order {}: {}", order.id, e);
            return Ok(None);
        }
        let result = self.match_locally(order);
        if !result.is_match() {
            return Ok(None);
        }
        self.lock(&order.ticker, &result)?;
        Ok(Some(result))
    }

    /// Confirm handler: closes the orders this peer locked for `result`
    pub fn on_confirm(&mut self, ticker: &str, result: &MatchResult) -> Result<SettlementReport, EngineError> {
        self.close(ticker, result)
    }

    /// Stores whatever quantity of `order` is still unfilled as an open order
    pub fn store_residual(&mut self, mut order: Order) -> Result<(), EngineError> {
        order.status = OrderStatus::Open;
        order.lock_expires_at = None;
        self.store.insert(order)
    }

    /// Removes closed orders from every ticker and, with a lock TTL
    /// configured, reopens expired locks
    pub fn sweep(&mut self) -> SweepReport {
        let now = now_millis();
        let mut report = SweepReport::default();
        for ticker in self.tickers.iter() {
            let removed = self.store.sweep(ticker);
            if removed > 0 {
                log::info!("Removed {} orders from ticker {}", removed, ticker);
            }
            report.removed += removed;

            if self.lock_ttl.is_some() {
                let released = self.store.release_expired_locks(ticker, now);
                if released > 0 {
                    log::info!("Released {} expired locks on ticker {}", released, ticker);
                }
                report.released += released;
            }
        }
        report
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
