//! Supported instruments
//!
//! The order universe is partitioned by ticker. The set is fixed when the
//! peer starts and every incoming order is checked against it.

use std::collections::BTreeSet;

pub const DEFAULT_TICKERS: [&str; 3] = ["btc-usd", "eth-usd", "xau-usd"];

/// Fixed set of instruments a peer trades
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerSet {
    names: BTreeSet<String>,
}

impl TickerSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.names.contains(ticker)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for TickerSet {
    fn default() -> Self {
        Self::new(DEFAULT_TICKERS)
    }
}
