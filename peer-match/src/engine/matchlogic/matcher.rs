use crate::engine::data::OrderStore;
use crate::engine::entry::{MatchResult, Order};
use rust_decimal::Decimal;

/// Scans the store for resting orders that can fill `incoming`.
///
/// Candidates are walked from the lowest price up. A candidate is skipped when
/// it belongs to the same owner, sits on the same side, is not open, or is
/// priced above the incoming limit. The price rule is the same for buys and
/// sells. Scanning stops once the accumulated quantity covers the order.
pub fn match_locally(store: &OrderStore, incoming: &Order, origin_peer: &str) -> MatchResult {
    let wanted_side = incoming.side.opposite();
    let mut needed = incoming.quantity;
    let mut matched_order_ids = Vec::new();

    for candidate in store.orders(&incoming.ticker) {
        if needed <= Decimal::ZERO {
            break;
        }

        if candidate.owner_id == incoming.owner_id
            || candidate.side != wanted_side
            || !candidate.is_open()
            || candidate.price > incoming.price
        {
            continue;
        }

        matched_order_ids.push(candidate.id.clone());
        if candidate.quantity >= needed {
            needed = Decimal::ZERO;
            break;
        }
        needed -= candidate.quantity;
    }

    MatchResult {
        fully_matched: needed <= Decimal::ZERO,
        matched_order_ids,
        quantity_matched: incoming.quantity - needed,
        origin_peer: origin_peer.to_string(),
    }
}
