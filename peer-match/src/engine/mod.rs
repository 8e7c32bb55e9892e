//! Match Engine Module
//!
//! Core of a peer: everything that reads or mutates the local order store.
//! - `data`: the per-ticker, price-ordered order store
//! - `entry`: orders, match results and supported tickers
//! - `errors`: engine error type
//! - `matchengine`: facade used by the peer driver and message handlers
//! - `matchlogic`: local matching and settlement

pub mod data;
pub mod entry;
pub mod errors;
pub mod matchengine;
pub mod matchlogic;

pub use errors::EngineError;
pub use matchengine::{MatchEngine, SweepReport};
