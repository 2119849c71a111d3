//! The single synchronous surface: `new` / `add_order` / `cancel_order`
//! / `snapshot`. Wraps [`OrderBook`] with timestamp stamping, order
//! validation, the append-only trade sink, and the optional debug CSV
//! diagnostics.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{info, warn};

use crate::debug_log::DebugSink;
use crate::errors::EngineError;
use crate::orderbook::{Level, OrderBook};
use crate::orders::{Order, OrderType, Side};
use crate::trade::{Trade, TradeResult};

/// Construction-time configuration for an [`Engine`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub debug: bool,
    pub trade_log_path: Option<PathBuf>,
    pub snapshot_log_path: Option<PathBuf>,
}

/// One order book instance: the matcher, the trade sink, and the book
/// inspector all live here, composed by direct ownership — no dynamic
/// dispatch needed for a single-instrument engine.
pub struct Engine {
    book: OrderBook,
    trades: Vec<Trade>,
    debug_sink: Option<DebugSink>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let debug_sink = if config.debug {
            Some(DebugSink::open(
                config.trade_log_path.as_deref(),
                config.snapshot_log_path.as_deref(),
            ))
        } else {
            None
        };
        Engine {
            book: OrderBook::new(),
            trades: Vec::new(),
            debug_sink,
        }
    }

    fn now_ns() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch")
            .as_nanos() as u64
    }

    fn validate(order: &Order) -> Result<(), EngineError> {
        if order.quantity == 0 {
            return Err(EngineError::NonPositiveQuantity(order.quantity));
        }
        if order.order_type == OrderType::Limit {
            match order.price {
                Some(price) if price.ticks() > 0 => {}
                _ => return Err(EngineError::InvalidLimitPrice),
            }
        }
        Ok(())
    }

    /// Submits `order`. Stamps `ts_ns` with the current wall clock if the
    /// caller left it zero. Returns the last-fill [`TradeResult`] plus
    /// the full ordered fill list for this submission: the lossy
    /// last-fill projection stays the primary contract, with the full
    /// list additionally available for callers that need it.
    pub fn add_order(&mut self, mut order: Order) -> Result<(TradeResult, Vec<Trade>), EngineError> {
        Self::validate(&order)?;

        if order.ts_ns == 0 {
            order.ts_ns = Self::now_ns();
        }
        let ts_ns = order.ts_ns;

        info!(order_id = order.id, ?order.side, ?order.order_type, "add_order accepted");

        let fills = match order.order_type {
            OrderType::Limit => {
                self.book.insert(order);
                self.book.cross_match(ts_ns)
            }
            OrderType::Market => {
                let mut incoming = order;
                self.book.sweep_market(&mut incoming, ts_ns)
            }
        };

        let result = fills
            .last()
            .map(TradeResult::from_trade)
            .unwrap_or_else(TradeResult::none);

        self.trades.extend(fills.iter().cloned());
        if let Some(sink) = &mut self.debug_sink {
            for trade in &fills {
                sink.log_trade(trade);
            }
        }

        Ok((result, fills))
    }

    /// Cancels a resting order. No-op for an unknown id — not an error
    /// to the caller.
    pub fn cancel_order(&mut self, id: u64) {
        if !self.book.cancel_order(id) {
            warn!(order_id = id, "cancel_order: no such resting order");
        }
    }

    /// Read-only level snapshot for one side. Also emits a row per
    /// level to the debug snapshot log, if enabled.
    pub fn snapshot(&mut self, side: Side) -> Vec<Level> {
        let levels: Vec<Level> = self.book.aggregate(side).collect();
        if let Some(sink) = &mut self.debug_sink {
            sink.log_snapshot(Self::now_ns(), side, &levels);
        }
        levels
    }

    /// All trades produced by this engine instance so far, in production
    /// order.
    pub fn trades_since(&self, marker: usize) -> &[Trade] {
        &self.trades[marker.min(self.trades.len())..]
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderType;

    fn order(id: u64, side: Side, order_type: OrderType, price: Option<&str>, qty: u64) -> Order {
        Order {
            id,
            side,
            order_type,
            price: price.map(|p| p.parse().unwrap()),
            quantity: qty,
            ts_ns: 1,
        }
    }

    #[test]
    fn stamps_zero_timestamp_with_wall_clock() {
        let mut engine = Engine::new(EngineConfig::default());
        let mut o = order(1, Side::Buy, OrderType::Limit, Some("10.0"), 1);
        o.ts_ns = 0;
        engine.add_order(o).unwrap();
        assert_eq!(engine.trade_count(), 0);
    }

    #[test]
    fn rejects_zero_quantity_without_mutating_book() {
        let mut engine = Engine::new(EngineConfig::default());
        let o = order(1, Side::Buy, OrderType::Limit, Some("10.0"), 0);
        let err = engine.add_order(o).unwrap_err();
        assert_eq!(err, EngineError::NonPositiveQuantity(0));
        assert!(engine.snapshot(Side::Buy).is_empty());
    }

    #[test]
    fn rejects_non_positive_limit_price() {
        let mut engine = Engine::new(EngineConfig::default());
        let o = order(1, Side::Buy, OrderType::Limit, Some("0.0"), 1);
        assert_eq!(
            engine.add_order(o).unwrap_err(),
            EngineError::InvalidLimitPrice
        );
    }

    #[test]
    fn last_fill_projection_reflects_final_trade_of_submission() {
        let mut engine = Engine::new(EngineConfig::default());
        engine
            .add_order(order(1, Side::Sell, OrderType::Limit, Some("100.5"), 5))
            .unwrap();
        engine
            .add_order(order(2, Side::Sell, OrderType::Limit, Some("101.0"), 7))
            .unwrap();
        let (result, fills) = engine
            .add_order(order(3, Side::Buy, OrderType::Market, None, 8))
            .unwrap();
        assert_eq!(fills.len(), 2);
        assert!(result.executed);
        assert_eq!(result.quantity, 3);
        assert_eq!(result.price, "101.0".parse().unwrap());
    }

    #[test]
    fn cancel_unknown_id_is_a_harmless_no_op() {
        let mut engine = Engine::new(EngineConfig::default());
        engine.cancel_order(999);
    }
}
