//! Peer Module
//!
//! A [`Peer`] drives the lifecycle of every order submitted to this process:
//! match against the local store, then against other peers, then store what
//! is left. It also answers the messages other peers send it.
//!
//! All store access goes through a mutex that is only held by synchronous
//! code and always released before awaiting the network. That keeps the
//! model of one cooperative scheduler per peer: between two suspension points
//! an order's `status` is the only thing that stops a concurrent submission
//! from matching liquidity that is already spoken for.

pub mod coordinator;
pub mod http_network;
pub mod message;
pub mod network;

pub use coordinator::Coordinator;
pub use http_network::HttpPeerNetwork;
pub use message::{AnnounceRequest, Envelope, PeerMessage, PeerResponse};
pub use network::{NetworkError, PeerNetwork, PeerReply};

use crate::engine::data::OrderStore;
use crate::engine::entry::{MatchResult, Order};
use crate::engine::{EngineError, MatchEngine, SweepReport};
use crate::metrics;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Where the quantity of a submitted order ended up
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitReport {
    pub order_id: String,
    pub matched_locally: Decimal,
    pub matched_remotely: Decimal,
    /// Peer that filled the remote part, if any
    pub remote_peer: Option<String>,
    /// Quantity stored as a new open order
    pub residual: Decimal,
}

pub struct Peer {
    name: String,
    engine: Mutex<MatchEngine>,
    coordinator: Coordinator,
    network: Arc<dyn PeerNetwork>,
}

impl Peer {
    pub fn new(engine: MatchEngine, network: Arc<dyn PeerNetwork>, request_timeout: Duration) -> Self {
        let name = engine.peer_name().to_string();
        Self {
            coordinator: Coordinator::new(name.clone(), network.clone(), request_timeout),
            engine: Mutex::new(engine),
            network,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn engine(&self) -> MutexGuard<'_, MatchEngine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn validate(&self, order: &Order) -> Result<(), EngineError> {
        self.engine().validate(order)
    }

    /// Processes a new order to completion: local match, then remote match,
    /// then store the residual quantity as an open order.
    pub async fn submit_order(&self, mut order: Order) -> Result<SubmitReport, EngineError> {
        let mut report = SubmitReport {
            order_id: order.id.clone(),
            ..Default::default()
        };

        {
            let mut engine = self.engine();
            if let Err(e) = engine.validate(&order) {
                log::warn!("Invalid order {}: {}", order.id, e);
                return Err(e);
            }

            log::info!("Incoming order {}", order);
            let result = engine.match_locally(&order);
            if result.is_match() {
                engine.close(&order.ticker, &result)?;
                log::info!(
                    "{} matched order {} locally",
                    match_kind(&result),
                    order.id
                );
                metrics::record_matched("local", result.quantity_matched);
                report.matched_locally = result.quantity_matched;
                if result.fully_matched {
                    return Ok(report);
                }
                order.quantity -= result.quantity_matched;
            }
        }

        log::info!(
            "Broadcasting order {} to peers since it wasn't fully matched locally",
            order.id
        );
        let result = self.coordinator.match_with_peers(&order).await;
        if result.is_match() {
            log::info!(
                "{} matched order {} with peer {}",
                match_kind(&result),
                order.id,
                result.origin_peer
            );
            metrics::record_matched("remote", result.quantity_matched);
            report.matched_remotely = result.quantity_matched;
            report.remote_peer = Some(result.origin_peer.clone());
            if result.fully_matched {
                return Ok(report);
            }
            order.quantity -= result.quantity_matched;
        }

        log::info!(
            "Adding order {} locally to peer {} since it wasn't fully matched",
            order,
            self.name
        );
        report.residual = order.quantity;
        self.engine().store_residual(order)?;
        Ok(report)
    }

    /// Handles one message from another peer. Messages that claim to come
    /// from this peer are dropped.
    pub fn handle_message(&self, envelope: Envelope) -> PeerResponse {
        let Envelope { from, message } = envelope;
        if from == self.name {
            return PeerResponse::default();
        }

        log::info!(
            "Incoming request to peer {} from {}, event {}",
            self.name,
            from,
            message.kind()
        );

        match message {
            PeerMessage::AnnounceOpenOrder { order } => match self.engine().on_announce(&order) {
                Ok(Some(result)) => {
                    log::info!(
                        "Cross match between {} and {}. Found {}, now locked",
                        self.name,
                        from,
                        result.quantity_matched
                    );
                    PeerResponse::matched(result)
                }
                Ok(None) => {
                    log::info!("Peer {} couldn't fulfil order from {}", self.name, from);
                    PeerResponse::default()
                }
                Err(e) => {
                    log::error!("Failed to lock orders for {}: {}", from, e);
                    PeerResponse::default()
                }
            },
            PeerMessage::CrossPeerMatch {
                ticker,
                match_result,
            } => {
                match self.engine().on_confirm(&ticker, &match_result) {
                    Ok(_) => log::info!("Cross peer match confirmed with {}", from),
                    Err(e) => log::error!("Failed to confirm match from {}: {}", from, e),
                }
                PeerResponse::default()
            }
            PeerMessage::Unknown => {
                log::warn!("Unknown event type from {}, ignoring it", from);
                PeerResponse::default()
            }
        }
    }

    pub fn match_locally(&self, order: &Order) -> MatchResult {
        self.engine().match_locally(order)
    }

    pub fn sweep(&self) -> SweepReport {
        let report = self.engine().sweep();
        metrics::SWEPT_COUNTER.inc_by(report.removed as u64);
        report
    }

    /// Copy of the whole store, for introspection
    pub fn open_orders(&self) -> OrderStore {
        self.engine().store().clone()
    }

    /// Starts the sweep and discovery announce loops
    pub fn start_background(
        self: &Arc<Self>,
        sweep_interval: Duration,
        announce_interval: Duration,
    ) -> Vec<JoinHandle<()>> {
        let sweeper = self.clone();
        let sweep = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                sweeper.sweep();
            }
        });

        let network = self.network.clone();
        let announce = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(announce_interval);
            loop {
                ticker.tick().await;
                network.announce().await;
            }
        });

        vec![sweep, announce]
    }
}

fn match_kind(result: &MatchResult) -> &'static str {
    if result.fully_matched {
        "Fully"
    } else {
        "Partially"
    }
}
