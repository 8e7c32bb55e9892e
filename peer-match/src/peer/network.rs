//! Peer network capability consumed by the core.
//!
//! Failures never surface as errors to order submitters: callers treat an
//! `Err` reply exactly like a peer that had nothing to offer.

use super::message::{Envelope, PeerResponse};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("peer {0} is unreachable")]
    Unreachable(String),
    #[error("request to peer {0} timed out")]
    Timeout(String),
    #[error("undecodable reply: {0}")]
    Decode(String),
    #[error("request failed: {0}")]
    Unknown(String),
}

/// One peer's answer to a broadcast
#[derive(Debug, Clone)]
pub struct PeerReply {
    pub peer: String,
    pub response: Result<PeerResponse, NetworkError>,
}

#[async_trait]
pub trait PeerNetwork: Send + Sync {
    /// Delivers `envelope` to every known peer and collects the replies in the
    /// order they arrive. No reachable peers yields an empty list.
    async fn broadcast(&self, envelope: Envelope, timeout: Duration) -> Vec<PeerReply>;

    /// Delivers `envelope` to the single peer named `target`
    async fn send(
        &self,
        target: &str,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<PeerResponse, NetworkError>;

    /// Advertises this peer's liveness and address to the discovery layer
    async fn announce(&self) {}
}
