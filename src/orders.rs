use crate::price::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Which side of the book an order rests on (or hits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side an order on `self` needs to cross against.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Plain LIMIT or MARKET. Post-only/IOC/FOK and other order-type
/// variations are a declared non-goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// An order accepted by the engine.
///
/// Immutable on arrival except `quantity`, which monotonically decreases
/// as the order trades. `price` is ignored for `OrderType::Market`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: Quantity,
    /// Nanosecond timestamp. Zero on submission means "stamp me" — the
    /// engine fills it in with its own clock reading at acceptance time.
    pub ts_ns: u64,
}

impl Order {
    pub fn is_limit(&self) -> bool {
        matches!(self.order_type, OrderType::Limit)
    }
}
