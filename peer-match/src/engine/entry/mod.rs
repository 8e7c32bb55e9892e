pub mod match_result;
pub mod order;
pub mod ticker;

pub use match_result::MatchResult;
pub use order::{new_order_id, Order, OrderPatch, OrderSide, OrderStatus};
pub use ticker::{TickerSet, DEFAULT_TICKERS};
