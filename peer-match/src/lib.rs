//! Distributed limit-order matching peer.
//!
//! Each peer holds its own order store for a fixed set of tickers, matches new
//! orders locally first and then asks the other peers, using an
//! announce → lock → confirm handshake to settle cross-peer fills.

pub mod config;
pub mod engine;
pub mod metrics;
pub mod peer;
pub mod server;
