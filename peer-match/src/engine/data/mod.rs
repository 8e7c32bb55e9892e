//! Data Structures Module
//!
//! Holds the per-ticker order store every other engine component reads or
//! mutates.

pub mod orderbook;

pub use orderbook::OrderStore;
