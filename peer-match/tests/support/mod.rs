use async_trait::async_trait;
use peer_match::engine::entry::{Order, OrderSide, TickerSet};
use peer_match::engine::MatchEngine;
use peer_match::peer::{Envelope, NetworkError, Peer, PeerNetwork, PeerReply, PeerResponse};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

/// Delivers messages by calling the target peers directly. Broadcasts reach
/// every joined peer in join order, the sender included.
#[derive(Default)]
pub struct InProcessNetwork {
    peers: RwLock<Vec<Weak<Peer>>>,
    broadcasts: AtomicUsize,
    confirms: Mutex<Vec<String>>,
}

impl InProcessNetwork {
    pub fn join(&self, peer: &Arc<Peer>) {
        self.peers.write().unwrap().push(Arc::downgrade(peer));
    }

    pub fn broadcast_count(&self) -> usize {
        self.broadcasts.load(Ordering::SeqCst)
    }

    pub fn reset_counters(&self) {
        self.broadcasts.store(0, Ordering::SeqCst);
        self.confirms.lock().unwrap().clear();
    }

    /// Targets of every direct send, in order
    pub fn confirms(&self) -> Vec<String> {
        self.confirms.lock().unwrap().clone()
    }

    fn members(&self) -> Vec<Arc<Peer>> {
        self.peers
            .read()
            .unwrap()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

#[async_trait]
impl PeerNetwork for InProcessNetwork {
    async fn broadcast(&self, envelope: Envelope, _timeout: Duration) -> Vec<PeerReply> {
        self.broadcasts.fetch_add(1, Ordering::SeqCst);
        self.members()
            .into_iter()
            .map(|peer| PeerReply {
                peer: peer.name().to_string(),
                response: Ok(peer.handle_message(envelope.clone())),
            })
            .collect()
    }

    async fn send(
        &self,
        target: &str,
        envelope: Envelope,
        _timeout: Duration,
    ) -> Result<PeerResponse, NetworkError> {
        self.confirms.lock().unwrap().push(target.to_string());
        self.members()
            .into_iter()
            .find(|peer| peer.name() == target)
            .map(|peer| peer.handle_message(envelope))
            .ok_or_else(|| NetworkError::Unreachable(target.to_string()))
    }
}

/// Peers joined to one in-process network, in the given order
pub fn cluster(names: &[&str]) -> (Arc<InProcessNetwork>, Vec<Arc<Peer>>) {
    let network = Arc::new(InProcessNetwork::default());
    let peers = names
        .iter()
        .map(|name| {
            let peer = Arc::new(Peer::new(
                MatchEngine::new(*name, TickerSet::default()),
                network.clone(),
                Duration::from_millis(100),
            ));
            network.join(&peer);
            peer
        })
        .collect();
    (network, peers)
}

pub fn order(side: OrderSide, price: Decimal, quantity: Decimal, owner: &str) -> Order {
    Order::new("btc-usd".to_string(), side, price, quantity, owner.to_string())
}
