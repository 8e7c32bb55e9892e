mod support;

use peer_match::engine::entry::{Order, OrderSide, OrderStatus};
use peer_match::peer::{Envelope, PeerMessage, PeerResponse};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use support::{cluster, order};

fn by_status(orders: &[Order], status: OrderStatus) -> Vec<Decimal> {
    orders
        .iter()
        .filter(|o| o.status == status)
        .map(|o| o.quantity)
        .collect()
}

#[tokio::test]
async fn unmatched_order_is_stored_open() {
    let (_network, peers) = cluster(&["p1"]);
    let sell = order(OrderSide::Sell, dec!(100), dec!(5), "A");
    let id = sell.id.clone();

    let report = peers[0].submit_order(sell).await.unwrap();
    assert_eq!(report.residual, dec!(5));

    let store = peers[0].open_orders();
    let stored = store.orders("btc-usd");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].status, OrderStatus::Open);
    assert_eq!(stored[0].quantity, dec!(5));
}

#[tokio::test]
async fn local_match_splits_resting_order_without_network() {
    let (network, peers) = cluster(&["p1"]);
    peers[0]
        .submit_order(order(OrderSide::Sell, dec!(100), dec!(5), "A"))
        .await
        .unwrap();
    network.reset_counters();

    let report = peers[0]
        .submit_order(order(OrderSide::Buy, dec!(100), dec!(3), "B"))
        .await
        .unwrap();

    assert_eq!(report.matched_locally, dec!(3));
    assert_eq!(report.residual, dec!(0));
    assert_eq!(network.broadcast_count(), 0);
    let store = peers[0].open_orders();
    let orders = store.orders("btc-usd");
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.side == OrderSide::Sell));
    assert_eq!(by_status(orders, OrderStatus::Closed), vec![dec!(3)]);
    assert_eq!(by_status(orders, OrderStatus::Open), vec![dec!(2)]);
}

#[tokio::test]
async fn self_match_goes_to_network() {
    let (network, peers) = cluster(&["p1"]);
    peers[0]
        .submit_order(order(OrderSide::Sell, dec!(100), dec!(5), "A"))
        .await
        .unwrap();
    network.reset_counters();

    let report = peers[0]
        .submit_order(order(OrderSide::Buy, dec!(100), dec!(3), "A"))
        .await
        .unwrap();

    assert_eq!(report.matched_locally, dec!(0));
    assert_eq!(network.broadcast_count(), 1);
    assert_eq!(report.residual, dec!(3));
    let store = peers[0].open_orders();
    assert_eq!(by_status(store.orders("btc-usd"), OrderStatus::Open).len(), 2);
}

#[tokio::test]
async fn price_that_does_not_cross_matches_nothing() {
    let (_network, peers) = cluster(&["p1"]);
    peers[0]
        .submit_order(order(OrderSide::Sell, dec!(110), dec!(5), "A"))
        .await
        .unwrap();

    let result = peers[0].match_locally(&order(OrderSide::Buy, dec!(100), dec!(3), "B"));
    assert_eq!(result.quantity_matched, dec!(0));
    assert!(!result.fully_matched);
}

#[tokio::test]
async fn first_responder_is_confirmed_and_other_lock_leaks() {
    let (network, peers) = cluster(&["x", "y", "z"]);
    let (x, y, z) = (&peers[0], &peers[1], &peers[2]);
    y.submit_order(order(OrderSide::Sell, dec!(100), dec!(5), "Y"))
        .await
        .unwrap();
    z.submit_order(order(OrderSide::Sell, dec!(100), dec!(5), "Z"))
        .await
        .unwrap();
    network.reset_counters();

    let report = x
        .submit_order(order(OrderSide::Buy, dec!(100), dec!(3), "B"))
        .await
        .unwrap();

    assert_eq!(report.matched_remotely, dec!(3));
    assert_eq!(report.remote_peer.as_deref(), Some("y"));
    assert_eq!(report.residual, dec!(0));
    assert_eq!(network.confirms(), vec!["y".to_string()]);
    assert_eq!(x.open_orders().len("btc-usd"), 0);

    let y_store = y.open_orders();
    let y_orders = y_store.orders("btc-usd");
    assert_eq!(by_status(y_orders, OrderStatus::Closed), vec![dec!(3)]);
    assert_eq!(by_status(y_orders, OrderStatus::Open), vec![dec!(2)]);

    let z_store = z.open_orders();
    let z_orders = z_store.orders("btc-usd");
    assert_eq!(by_status(z_orders, OrderStatus::Locked), vec![dec!(3)]);
    assert_eq!(by_status(z_orders, OrderStatus::Open), vec![dec!(2)]);

    // Sweeping does not touch the leaked lock.
    z.sweep();
    let z_store = z.open_orders();
    assert_eq!(by_status(z_store.orders("btc-usd"), OrderStatus::Locked), vec![dec!(3)]);
}

#[tokio::test]
async fn residual_after_local_and_remote_is_stored() {
    let (_network, peers) = cluster(&["x", "y"]);
    let (x, y) = (&peers[0], &peers[1]);
    y.submit_order(order(OrderSide::Sell, dec!(99), dec!(3), "Y"))
        .await
        .unwrap();
    x.submit_order(order(OrderSide::Sell, dec!(98), dec!(2), "A"))
        .await
        .unwrap();

    let buy = order(OrderSide::Buy, dec!(100), dec!(10), "B");
    let buy_id = buy.id.clone();
    let report = x.submit_order(buy).await.unwrap();

    assert_eq!(report.matched_locally, dec!(2));
    assert_eq!(report.matched_remotely, dec!(3));
    assert_eq!(report.residual, dec!(5));

    let x_store = x.open_orders();
    let residual = x_store.find("btc-usd", &buy_id).unwrap();
    assert_eq!(residual.status, OrderStatus::Open);
    assert_eq!(residual.quantity, dec!(5));
    assert_eq!(by_status(y.open_orders().orders("btc-usd"), OrderStatus::Closed), vec![dec!(3)]);

    assert_eq!(x.sweep().removed, 1);
    assert_eq!(y.sweep().removed, 1);
    assert_eq!(x.sweep().removed, 0);
}

#[tokio::test]
async fn invalid_order_is_dropped() {
    let (network, peers) = cluster(&["p1"]);
    let bad = order(OrderSide::Buy, dec!(100), dec!(0), "A");
    assert!(peers[0].submit_order(bad).await.is_err());
    assert_eq!(network.broadcast_count(), 0);
    assert_eq!(peers[0].open_orders().len("btc-usd"), 0);
}

#[tokio::test]
async fn handler_ignores_own_and_unknown_messages() {
    let (_network, peers) = cluster(&["p1"]);
    let p1 = &peers[0];
    p1.submit_order(order(OrderSide::Sell, dec!(100), dec!(5), "A"))
        .await
        .unwrap();

    let own = Envelope::new(
        "p1",
        PeerMessage::AnnounceOpenOrder {
            order: order(OrderSide::Buy, dec!(100), dec!(1), "B"),
        },
    );
    assert_eq!(p1.handle_message(own), PeerResponse::default());

    let unknown = Envelope::new("p2", PeerMessage::Unknown);
    assert_eq!(p1.handle_message(unknown), PeerResponse::default());

    let store = p1.open_orders();
    assert_eq!(by_status(store.orders("btc-usd"), OrderStatus::Open), vec![dec!(5)]);
}

#[tokio::test]
async fn no_order_of_an_owner_is_matched_against_itself() {
    let (_network, peers) = cluster(&["p1"]);
    let p1 = &peers[0];
    for price in [dec!(97), dec!(98), dec!(99)] {
        p1.submit_order(order(OrderSide::Sell, price, dec!(1), "A"))
            .await
            .unwrap();
    }
    p1.submit_order(order(OrderSide::Sell, dec!(99), dec!(1), "C"))
        .await
        .unwrap();

    let result = p1.match_locally(&order(OrderSide::Buy, dec!(100), dec!(4), "A"));
    let store = p1.open_orders();
    for id in &result.matched_order_ids {
        assert_ne!(store.find("btc-usd", id).unwrap().owner_id, "A");
    }
    assert_eq!(result.quantity_matched, dec!(1));
}
