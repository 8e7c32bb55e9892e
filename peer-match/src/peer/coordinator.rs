//! Cross-peer coordinator
//!
//! Runs the initiating side of the announce → lock → confirm handshake:
//! broadcast the order, take the first peer that answered with a match, and
//! confirm with exactly that peer. Peers that locked liquidity but were not
//! picked never hear back, so their locks stay in place until a lock TTL (if
//! configured) releases them.

use super::message::{Envelope, PeerMessage};
use super::network::{NetworkError, PeerNetwork};
use crate::engine::entry::{MatchResult, Order};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

pub struct Coordinator {
    name: String,
    network: Arc<dyn PeerNetwork>,
    timeout: Duration,
}

impl Coordinator {
    pub fn new(name: impl Into<String>, network: Arc<dyn PeerNetwork>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            network,
            timeout,
        }
    }

    /// Sends `order` to every peer. Each entry is the responding peer and its
    /// match, `None` when it had nothing, failed, or timed out.
    pub async fn broadcast_announce(&self, order: &Order) -> Vec<(String, Option<MatchResult>)> {
        let envelope = Envelope::new(
            self.name.clone(),
            PeerMessage::AnnounceOpenOrder {
                order: order.clone(),
            },
        );

        self.network
            .broadcast(envelope, self.timeout)
            .await
            .into_iter()
            .filter(|reply| reply.peer != self.name)
            .map(|reply| match reply.response {
                Ok(response) => {
                    let result = response
                        .match_result
                        .filter(|result| is_plausible(result, order, &reply.peer));
                    (reply.peer, result)
                }
                Err(e) => {
                    log::warn!("No answer from peer {}: {}", reply.peer, e);
                    (reply.peer, None)
                }
            })
            .collect()
    }

    /// First response that matched a non-zero quantity
    pub fn select(responses: Vec<(String, Option<MatchResult>)>) -> Option<MatchResult> {
        responses
            .into_iter()
            .filter_map(|(_, result)| result)
            .find(MatchResult::is_match)
    }

    /// Tells `peer` to close the orders it locked for `result`
    pub async fn confirm(&self, peer: &str, ticker: &str, result: &MatchResult) -> Result<(), NetworkError> {
        let envelope = Envelope::new(
            self.name.clone(),
            PeerMessage::CrossPeerMatch {
                ticker: ticker.to_string(),
                match_result: result.clone(),
            },
        );
        self.network.send(peer, envelope, self.timeout).await.map(|_| ())
    }

    /// Announce, select and confirm. Returns an empty result when no peer
    /// could fill any part of `order`.
    pub async fn match_with_peers(&self, order: &Order) -> MatchResult {
        let responses = self.broadcast_announce(order).await;
        let Some(result) = Self::select(responses) else {
            return MatchResult::empty(&self.name);
        };

        log::info!("Found match with peer {}", result.origin_peer);
        // The remote side already locked this quantity, so it counts as
        // filled even if the confirm gets lost.
        if let Err(e) = self.confirm(&result.origin_peer, &order.ticker, &result).await {
            log::warn!(
                "Confirm to peer {} failed, its orders stay locked: {}",
                result.origin_peer,
                e
            );
        }
        result
    }
}

/// Rejects replies that claim more than was asked or come from a peer other
/// than the one named in the result
fn is_plausible(result: &MatchResult, order: &Order, peer: &str) -> bool {
    if result.origin_peer != peer {
        log::warn!(
            "Peer {} answered with a match from {}, ignoring it",
            peer,
            result.origin_peer
        );
        return false;
    }
    if result.quantity_matched < Decimal::ZERO || result.quantity_matched > order.quantity {
        log::warn!(
            "Peer {} matched {} of an order for {}, ignoring it",
            peer,
            result.quantity_matched,
            order.quantity
        );
        return false;
    }
    if result.fully_matched != (result.quantity_matched == order.quantity) {
        log::warn!(
            "Peer {} reported fully_matched={} for {} of {}, ignoring it",
            peer,
            result.fully_matched,
            result.quantity_matched,
            order.quantity
        );
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn result(peer: &str, quantity: Decimal) -> MatchResult {
        MatchResult {
            fully_matched: false,
            matched_order_ids: vec!["x".to_string()],
            quantity_matched: quantity,
            origin_peer: peer.to_string(),
        }
    }

    #[test]
    fn select_takes_first_positive_answer() {
        let responses = vec![
            ("a".to_string(), None),
            ("b".to_string(), Some(result("b", dec!(0)))),
            ("c".to_string(), Some(result("c", dec!(2)))),
            ("d".to_string(), Some(result("d", dec!(5)))),
        ];
        assert_eq!(Coordinator::select(responses).unwrap().origin_peer, "c");
    }

    #[test]
    fn rejects_replies_that_misreport_the_fill() {
        let order = Order::new(
            "btc-usd".to_string(),
            crate::engine::entry::OrderSide::Buy,
            dec!(100),
            dec!(5),
            "B".to_string(),
        );
        assert!(is_plausible(&result("b", dec!(2)), &order, "b"));
        assert!(!is_plausible(&result("c", dec!(2)), &order, "b"));
        assert!(!is_plausible(&result("b", dec!(6)), &order, "b"));

        let overclaimed = MatchResult {
            fully_matched: true,
            ..result("b", dec!(2))
        };
        assert!(!is_plausible(&overclaimed, &order, "b"));

        let underclaimed = result("b", dec!(5));
        assert!(!is_plausible(&underclaimed, &order, "b"));
        let full = MatchResult {
            fully_matched: true,
            ..underclaimed
        };
        assert!(is_plausible(&full, &order, "b"));
    }

    #[test]
    fn select_with_no_answers_is_none() {
        assert_eq!(Coordinator::select(vec![("a".to_string(), None)]), None);
        assert_eq!(Coordinator::select(Vec::new()), None);
    }
}
