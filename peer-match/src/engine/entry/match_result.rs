//! Match Result
//!
//! Outcome of scanning one peer's store for liquidity against an incoming
//! order. It never mutates anything; settlement consumes it afterwards.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Liquidity found for an incoming order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// True when the matched quantity covers the whole incoming order
    pub fully_matched: bool,
    /// Ids of the matched resting orders, in the order they were consumed
    pub matched_order_ids: Vec<String>,
    /// Quantity covered, capped at the incoming order's quantity
    pub quantity_matched: Decimal,
    /// Peer whose store produced the match
    pub origin_peer: String,
}

impl MatchResult {
    /// A result that matched nothing
    pub fn empty(origin_peer: &str) -> Self {
        Self {
            fully_matched: false,
            matched_order_ids: Vec::new(),
            quantity_matched: Decimal::ZERO,
            origin_peer: origin_peer.to_string(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.quantity_matched > Decimal::ZERO
    }
}
