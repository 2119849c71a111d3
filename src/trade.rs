use crate::price::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// A matched transaction between a resting (maker) order and an incoming
/// (taker) order. Created only by the matcher; once created, never
/// modified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub ts_ns: u64,
    pub buy_order_id: u64,
    pub sell_order_id: u64,
    pub price: Price,
    pub quantity: Quantity,
}

/// The most recent fill produced by a single `add_order` call.
///
/// If a submission produced multiple fills, only the *last* one's fields
/// are reflected here: a deliberately lossy projection. `executed =
/// false` with zeroed fields means no fill occurred for that
/// submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub executed: bool,
    pub price: Price,
    pub quantity: Quantity,
    pub buy_order_id: u64,
    pub sell_order_id: u64,
}

impl TradeResult {
    pub fn none() -> Self {
        TradeResult {
            executed: false,
            price: Price::from_ticks(0),
            quantity: 0,
            buy_order_id: 0,
            sell_order_id: 0,
        }
    }

    pub fn from_trade(trade: &Trade) -> Self {
        TradeResult {
            executed: true,
            price: trade.price,
            quantity: trade.quantity,
            buy_order_id: trade.buy_order_id,
            sell_order_id: trade.sell_order_id,
        }
    }
}
