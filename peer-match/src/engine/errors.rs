use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Ticker {0} is not traded on this peer")]
    UnknownTicker(String),
    #[error("Invalid price {0}, it must be positive")]
    InvalidPrice(Decimal),
    #[error("Invalid quantity {0}, it must be positive")]
    InvalidQuantity(Decimal),
    /// An id that was expected to exist is gone. Callers look orders up right
    /// before updating them, so hitting this means the store was mutated in
    /// between.
    #[error("Tried to update order {id} of ticker {ticker} but it wasn't found")]
    OrderNotFound { ticker: String, id: String },
}
