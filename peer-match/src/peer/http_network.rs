//! HTTP peer network
//!
//! Sends peer messages as JSON over `POST /rpc` and keeps a registry of known
//! peers. The registry starts with the configured seed nodes and learns other
//! peers from their periodic `POST /announce` calls.

use super::message::{AnnounceRequest, Envelope, PeerResponse};
use super::network::{NetworkError, PeerNetwork, PeerReply};
use async_trait::async_trait;
use hyper::body::Bytes;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

pub const RPC_PATH: &str = "/rpc";
pub const ANNOUNCE_PATH: &str = "/announce";

/// Timeout for discovery announcements, which nobody waits on
const ANNOUNCE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
struct PeerEntry {
    addr: String,
    /// Seeds come from configuration and are never pruned
    seed: bool,
    last_seen: Option<Instant>,
}

/// Known peers by name
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<String, PeerEntry>,
}

impl PeerRegistry {
    pub fn with_seeds<I>(seeds: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let peers = seeds
            .into_iter()
            .map(|(name, addr)| {
                (
                    name,
                    PeerEntry {
                        addr,
                        seed: true,
                        last_seen: None,
                    },
                )
            })
            .collect();
        Self { peers }
    }

    pub fn register(&mut self, name: &str, addr: &str) {
        let now = Instant::now();
        match self.peers.get_mut(name) {
            Some(entry) => {
                if entry.addr != addr {
                    log::info!("Peer {} moved from {} to {}", name, entry.addr, addr);
                    entry.addr = addr.to_string();
                }
                entry.last_seen = Some(now);
            }
            None => {
                log::info!("Discovered peer {} at {}", name, addr);
                self.peers.insert(
                    name.to_string(),
                    PeerEntry {
                        addr: addr.to_string(),
                        seed: false,
                        last_seen: Some(now),
                    },
                );
            }
        }
    }

    /// Drops discovered peers not heard from within `ttl`
    pub fn prune(&mut self, ttl: Duration) -> usize {
        let before = self.peers.len();
        self.peers.retain(|name, entry| {
            let alive = entry.seed || entry.last_seen.map_or(false, |seen| seen.elapsed() <= ttl);
            if !alive {
                log::info!("Forgetting peer {} at {}", name, entry.addr);
            }
            alive
        });
        before - self.peers.len()
    }

    pub fn addr_of(&self, name: &str) -> Option<String> {
        self.peers.get(name).map(|entry| entry.addr.clone())
    }

    /// `(name, addr)` of every known peer except `me`
    pub fn targets(&self, me: &str) -> Vec<(String, String)> {
        let mut targets: Vec<(String, String)> = self
            .peers
            .iter()
            .filter(|(name, _)| name.as_str() != me)
            .map(|(name, entry)| (name.clone(), entry.addr.clone()))
            .collect();
        targets.sort();
        targets
    }
}

pub struct HttpPeerNetwork {
    name: String,
    /// Address other peers should use to reach this one
    advertise_addr: String,
    peer_ttl: Duration,
    client: Client<HttpConnector>,
    registry: RwLock<PeerRegistry>,
}

impl HttpPeerNetwork {
    pub fn new(
        name: impl Into<String>,
        advertise_addr: impl Into<String>,
        seeds: Vec<(String, String)>,
        peer_ttl: Duration,
    ) -> Self {
        let name = name.into();
        let seeds = seeds.into_iter().filter(|(seed, _)| *seed != name);
        Self {
            advertise_addr: advertise_addr.into(),
            registry: RwLock::new(PeerRegistry::with_seeds(seeds)),
            name,
            peer_ttl,
            client: Client::new(),
        }
    }

    /// Records an announcement received from another peer
    pub fn register(&self, announce: &AnnounceRequest) {
        if announce.name == self.name {
            return;
        }
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(&announce.name, &announce.addr);
    }

    pub fn known_peers(&self) -> Vec<(String, String)> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .targets(&self.name)
    }

    fn addr_of(&self, name: &str) -> Option<String> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .addr_of(name)
    }
}

#[async_trait]
impl PeerNetwork for HttpPeerNetwork {
    async fn broadcast(&self, envelope: Envelope, timeout: Duration) -> Vec<PeerReply> {
        let targets = self.known_peers();
        if targets.is_empty() {
            log::info!("No peers found");
            return Vec::new();
        }

        let body = match serde_json::to_vec(&envelope) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                log::error!("Failed to encode {} message: {}", envelope.message.kind(), e);
                return Vec::new();
            }
        };

        let mut pending = JoinSet::new();
        for (peer, addr) in targets {
            let client = self.client.clone();
            let body = body.clone();
            pending.spawn(async move {
                let response = post_json(&client, &peer, &addr, RPC_PATH, body, timeout)
                    .await
                    .and_then(|bytes| decode_response(&peer, &bytes));
                PeerReply { peer, response }
            });
        }

        let mut replies = Vec::new();
        while let Some(joined) = pending.join_next().await {
            match joined {
                Ok(reply) => replies.push(reply),
                Err(e) => log::error!("Broadcast task failed: {}", e),
            }
        }
        replies
    }

    async fn send(
        &self,
        target: &str,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<PeerResponse, NetworkError> {
        let addr = self
            .addr_of(target)
            .ok_or_else(|| NetworkError::Unreachable(target.to_string()))?;
        let body = serde_json::to_vec(&envelope).map_err(|e| NetworkError::Unknown(e.to_string()))?;
        let bytes = post_json(&self.client, target, &addr, RPC_PATH, Bytes::from(body), timeout).await?;
        decode_response(target, &bytes)
    }

    async fn announce(&self) {
        let pruned = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .prune(self.peer_ttl);
        if pruned > 0 {
            log::debug!("Pruned {} silent peers", pruned);
        }

        let announce = AnnounceRequest {
            name: self.name.clone(),
            addr: self.advertise_addr.clone(),
        };
        let body = match serde_json::to_vec(&announce) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                log::error!("Failed to encode announce: {}", e);
                return;
            }
        };

        let mut pending = JoinSet::new();
        for (peer, addr) in self.known_peers() {
            let client = self.client.clone();
            let body = body.clone();
            pending.spawn(async move {
                if let Err(e) = post_json(&client, &peer, &addr, ANNOUNCE_PATH, body, ANNOUNCE_TIMEOUT).await {
                    log::debug!("Announce to {} failed: {}", peer, e);
                }
            });
        }
        while pending.join_next().await.is_some() {}
    }
}

async fn post_json(
    client: &Client<HttpConnector>,
    peer: &str,
    addr: &str,
    path: &str,
    body: Bytes,
    timeout: Duration,
) -> Result<Bytes, NetworkError> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("http://{}{}", addr, path))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .map_err(|e| NetworkError::Unknown(e.to_string()))?;

    let exchange = async {
        let response = client.request(request).await?;
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await?;
        Ok::<_, hyper::Error>((status, bytes))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Err(_) => Err(NetworkError::Timeout(peer.to_string())),
        Ok(Err(e)) if e.is_connect() => Err(NetworkError::Unreachable(peer.to_string())),
        Ok(Err(e)) if e.is_timeout() => Err(NetworkError::Timeout(peer.to_string())),
        Ok(Err(e)) => Err(NetworkError::Unknown(e.to_string())),
        Ok(Ok((status, _))) if !status.is_success() => Err(NetworkError::Unknown(format!(
            "peer {} answered with status {}",
            peer, status
        ))),
        Ok(Ok((_, bytes))) => Ok(bytes),
    }
}

fn decode_response(peer: &str, bytes: &[u8]) -> Result<PeerResponse, NetworkError> {
    serde_json::from_slice(bytes)
        .map_err(|e| NetworkError::Decode(format!("bad response from peer {}: {}", peer, e)))
}
