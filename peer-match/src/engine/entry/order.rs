use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    #[default]
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Matching eligibility of a stored order.
///
/// `Open` orders can be matched. `Locked` orders are reserved by a cross-peer
/// handshake and wait for a confirm. `Closed` orders are terminal and get
/// removed by the next sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Open,
    Locked,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub ticker: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: Decimal,
    pub owner_id: String,
    #[serde(default)]
    pub status: OrderStatus,
    /// Unix millis after which a lock may be released. Only set when lock
    /// expiry is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_expires_at: Option<u64>,
}

impl Order {
    pub fn new(
        ticker: String,
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        owner_id: String,
    ) -> Self {
        Self {
            id: new_order_id(),
            ticker,
            side,
            price,
            quantity,
            owner_id,
            status: OrderStatus::Open,
            lock_expires_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }

    /// Copy of this order under a fresh id, used for the unconsumed part of a
    /// split.
    pub fn remainder(&self, quantity: Decimal) -> Order {
        Order {
            id: new_order_id(),
            quantity,
            status: OrderStatus::Open,
            lock_expires_at: None,
            ..self.clone()
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {:?} {} {} @ {} (owner {}, id {})",
            self.status, self.side, self.quantity, self.ticker, self.price, self.owner_id, self.id
        )
    }
}

/// Partial update applied by `OrderStore::update`. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub status: Option<OrderStatus>,
    pub quantity: Option<Decimal>,
    pub lock_expires_at: Option<Option<u64>>,
}

impl OrderPatch {
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_lock_expiry(mut self, lock_expires_at: Option<u64>) -> Self {
        self.lock_expires_at = Some(lock_expires_at);
        self
    }

    pub(crate) fn apply_to(self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(quantity) = self.quantity {
            order.quantity = quantity;
        }
        if let Some(lock_expires_at) = self.lock_expires_at {
            order.lock_expires_at = lock_expires_at;
        }
    }
}

pub fn new_order_id() -> String {
    Uuid::new_v4().simple().to_string()
}
