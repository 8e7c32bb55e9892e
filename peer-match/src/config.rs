use crate::engine::entry::{TickerSet, DEFAULT_TICKERS};
use log::warn;
use serde_derive::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct NodeConfig {
    pub name: String,
    pub addr: String,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub name: String,
    pub peer_addr: String,
    /// Address other peers use to reach `peer_addr`, when it differs
    pub advertise_addr: Option<String>,
    pub http_addr: String,
    pub metrics_addr: String,
    pub node_list: Vec<NodeConfig>,
    pub tickers: Vec<String>,
    pub request_timeout_ms: u64,
    pub sweep_interval_ms: u64,
    pub announce_interval_ms: u64,
    pub peer_ttl_ms: u64,
    pub lock_ttl_ms: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig::new()
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        RuntimeConfig {
            name: "peer-1".to_string(),
            peer_addr: "127.0.0.1:4000".to_string(),
            advertise_addr: None,
            http_addr: "127.0.0.1:40000".to_string(),
            metrics_addr: "127.0.0.1:4010".to_string(),
            node_list: Vec::new(),
            tickers: DEFAULT_TICKERS.iter().map(|t| t.to_string()).collect(),
            request_timeout_ms: 3_000,
            sweep_interval_ms: 5_000,
            announce_interval_ms: 1_000,
            peer_ttl_ms: 10_000,
            lock_ttl_ms: None,
        }
    }

    pub fn from_toml(path: &str) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Something went wrong reading the runtime config file, {:?}",
                    e
                );
                return RuntimeConfig::new();
            }
        };
        match toml::from_str(&contents) {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "Something went wrong reading the runtime config file, {:?}",
                    e
                );
                RuntimeConfig::new()
            }
        }
    }

    pub fn advertised_addr(&self) -> &str {
        self.advertise_addr.as_deref().unwrap_or(&self.peer_addr)
    }

    pub fn ticker_set(&self) -> TickerSet {
        TickerSet::new(self.tickers.iter().cloned())
    }

    pub fn seeds(&self) -> Vec<(String, String)> {
        self.node_list
            .iter()
            .map(|n| (n.name.clone(), n.addr.clone()))
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }

    pub fn peer_ttl(&self) -> Duration {
        Duration::from_millis(self.peer_ttl_ms)
    }

    pub fn lock_ttl(&self) -> Option<Duration> {
        self.lock_ttl_ms.map(Duration::from_millis)
    }
}
