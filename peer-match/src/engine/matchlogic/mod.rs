//! Match Logic Module
//!
//! Read-only scan of the order store that decides which resting orders can
//! fill an incoming one, and the settlement step that applies such a result.

pub mod matcher;
pub mod settlement;

pub use matcher::match_locally;
pub use settlement::{apply, SettlementReport};
