//! Settlement
//!
//! Applies a match result to the store that produced it. Used with `Locked`
//! when a peer reserves liquidity for a remote announce, and with `Closed` when
//! a local match is final or a remote lock is confirmed.

use crate::engine::data::OrderStore;
use crate::engine::entry::{MatchResult, OrderPatch, OrderStatus};
use crate::engine::errors::EngineError;
use rust_decimal::Decimal;

/// What a settlement pass touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementReport {
    /// Ids whose status was set, in processing order
    pub settled_ids: Vec<String>,
    /// Id of the open remainder created when the last order was split
    pub remainder_id: Option<String>,
    /// Ids from the result that were no longer in the store
    pub missing_ids: Vec<String>,
}

/// Sets `status` on the orders named by `result`.
///
/// A running counter starts at `result.quantity_matched` and shrinks by each
/// consumed order. When an order holds more than the counter, it is cut down
/// to the counter and a new open order with a fresh id takes the surplus; the
/// pass ends there. Ids that are gone or already closed are logged and
/// skipped.
pub fn apply(
    store: &mut OrderStore,
    status: OrderStatus,
    ticker: &str,
    result: &MatchResult,
    lock_expires_at: Option<u64>,
) -> Result<SettlementReport, EngineError> {
    let mut report = SettlementReport::default();
    let mut still_needed = result.quantity_matched;

    for id in &result.matched_order_ids {
        if still_needed <= Decimal::ZERO {
            break;
        }

        let order = match store.find(ticker, id) {
            Some(order) if order.status == OrderStatus::Closed => {
                log::warn!("Order {} is already closed, skipping", id);
                continue;
            }
            Some(order) => order.clone(),
            None => {
                log::warn!("Tried to settle order {} but it wasn't found", id);
                report.missing_ids.push(id.clone());
                continue;
            }
        };

        let patch = OrderPatch::status(status).with_lock_expiry(match status {
            OrderStatus::Locked => lock_expires_at,
            _ => None,
        });

        if order.quantity > still_needed {
            let remainder = order.remainder(order.quantity - still_needed);
            report.remainder_id = Some(remainder.id.clone());
            store.update(ticker, id, patch.with_quantity(still_needed))?;
            store.insert(remainder)?;
            report.settled_ids.push(id.clone());
            break;
        }

        store.update(ticker, id, patch)?;
        still_needed -= order.quantity;
        report.settled_ids.push(id.clone());
    }

    Ok(report)
}
