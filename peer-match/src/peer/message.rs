//! Peer-to-peer message contract
//!
//! Every request travels as an [`Envelope`] carrying the sender's name. The
//! body is a [`PeerMessage`] tagged by its `type` field; a tag this build does
//! not know decodes to [`PeerMessage::Unknown`] instead of failing.

use crate::engine::entry::{MatchResult, Order};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerMessage {
    /// Ask every peer whether it can fill `order`. Peers that can pre-lock
    /// the liquidity before replying.
    AnnounceOpenOrder { order: Order },
    /// Confirm to one peer that the orders it locked for `match_result` are
    /// now closed.
    CrossPeerMatch {
        ticker: String,
        match_result: MatchResult,
    },
    #[serde(other)]
    Unknown,
}

impl PeerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::AnnounceOpenOrder { .. } => "AnnounceOpenOrder",
            PeerMessage::CrossPeerMatch { .. } => "CrossPeerMatch",
            PeerMessage::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: String,
    pub message: PeerMessage,
}

impl Envelope {
    pub fn new(from: impl Into<String>, message: PeerMessage) -> Self {
        Self {
            from: from.into(),
            message,
        }
    }
}

/// Reply to any peer message. Only announces carry a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerResponse {
    #[serde(default)]
    pub match_result: Option<MatchResult>,
}

impl PeerResponse {
    pub fn matched(match_result: MatchResult) -> Self {
        Self {
            match_result: Some(match_result),
        }
    }
}

/// Liveness announcement used by discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnounceRequest {
    pub name: String,
    pub addr: String,
}
