//! Two-sided price-time-priority ladder and the cross/sweep matching
//! algorithms that operate on it.
//!
//! Same `BTreeMap<Price, VecDeque<Order>>` ladder shape, same reversed-
//! iterator trick for descending bid traversal, same linear-scan cancel
//! as a conventional in-memory limit order book. Split into two
//! distinct matching paths (LIMIT post-then-match vs. MARKET
//! sweep-then-discard) because their execution-price rules differ.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info, trace, warn};

use crate::orders::{Order, Side};
use crate::price::Price;
use crate::trade::Trade;

/// A `(price, total resting quantity)` pair, as produced by
/// [`OrderBook::aggregate`] for book inspection.
pub type Level = (Price, u64);

/// Two price-indexed ladders of resting orders.
///
/// Invariants maintained by every public method:
/// 1. no-cross: after any mutation, best bid < best ask when both sides
///    are non-empty;
/// 2. every queued order has `quantity > 0`;
/// 3. no empty price-level entries survive a mutation;
/// 4. FIFO (insertion order) is preserved within a level.
#[derive(Debug, Default)]
pub struct OrderBook {
    /// Buy orders, keyed by price ascending; best bid is the *last* key.
    bids: BTreeMap<Price, VecDeque<Order>>,
    /// Sell orders, keyed by price ascending; best ask is the *first* key.
    asks: BTreeMap<Price, VecDeque<Order>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    fn ladder_mut(&mut self, side: Side) -> &mut BTreeMap<Price, VecDeque<Order>> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Best bid price, or `None` if there are no resting buy orders.
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    /// Best ask price, or `None` if there are no resting sell orders.
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    /// True while `best_bid >= best_ask` (both present) — the crossed state
    /// that `cross_match` eliminates before returning.
    fn is_crossed(&self) -> bool {
        matches!((self.best_bid(), self.best_ask()), (Some(b), Some(a)) if b >= a)
    }

    /// Appends `order` to the tail of its side/price-level FIFO, creating
    /// the level if it doesn't exist yet. Never called for MARKET orders,
    /// which are never rested.
    pub fn insert(&mut self, order: Order) {
        debug_assert!(order.is_limit(), "only LIMIT orders rest in the book");
        let price = order
            .price
            .expect("LIMIT order must carry a price to rest");
        let side = order.side;
        self.ladder_mut(side)
            .entry(price)
            .or_insert_with(VecDeque::new)
            .push_back(order);
    }

    /// Removes every order with `id` from both ladders. No-op (and
    /// observable only via the `debug!` line below) if the id is not
    /// resting.
    pub fn cancel_order(&mut self, id: u64) -> bool {
        let mut removed = false;
        for side in [Side::Buy, Side::Sell] {
            let ladder = self.ladder_mut(side);
            let mut empty_levels = Vec::new();
            for (&price, queue) in ladder.iter_mut() {
                let before = queue.len();
                queue.retain(|o| o.id != id);
                if queue.len() != before {
                    removed = true;
                }
                if queue.is_empty() {
                    empty_levels.push(price);
                }
            }
            for price in empty_levels {
                ladder.remove(&price);
            }
        }
        if !removed {
            debug!(order_id = id, "cancel_order: id not resting, no-op");
        }
        removed
    }

    /// Lazy `(price, total_qty)` sequence in the ladder's natural order
    /// (descending for bids, ascending for asks).
    pub fn aggregate(&self, side: Side) -> impl Iterator<Item = Level> + '_ {
        let iter: Box<dyn Iterator<Item = (&Price, &VecDeque<Order>)>> = match side {
            Side::Buy => Box::new(self.bids.iter().rev()),
            Side::Sell => Box::new(self.asks.iter()),
        };
        iter.map(|(&price, queue)| (price, queue.iter().map(|o| o.quantity).sum()))
    }

    /// Runs the LIMIT "post-then-match" loop until the book is no longer
    /// crossed.
    ///
    /// Execution price is always the best ask's price, an intentionally
    /// asymmetric rule — see `DESIGN.md`'s open-question notes. All
    /// trades produced by one call share `ts_ns` (the timestamp of the
    /// order whose insertion triggered this call): the clock is sampled
    /// once per submission, not once per trade, so replaying a run with
    /// externally supplied timestamps reproduces byte-identical output.
    pub fn cross_match(&mut self, ts_ns: u64) -> Vec<Trade> {
        let mut trades = Vec::new();
        while self.is_crossed() {
            let bid_price = self.best_bid().expect("is_crossed implies both sides present");
            let ask_price = self.best_ask().expect("is_crossed implies both sides present");

            let (buy_id, sell_id, trade_qty, buy_exhausted, sell_exhausted) = {
                let buy_level = self.bids.get_mut(&bid_price).unwrap();
                let sell_level = self.asks.get_mut(&ask_price).unwrap();
                let buy = buy_level.front_mut().expect("non-empty level");
                let sell = sell_level.front_mut().expect("non-empty level");

                let trade_qty = buy.quantity.min(sell.quantity);
                buy.quantity -= trade_qty;
                sell.quantity -= trade_qty;

                (buy.id, sell.id, trade_qty, buy.quantity == 0, sell.quantity == 0)
            };

            let trade = Trade {
                ts_ns,
                buy_order_id: buy_id,
                sell_order_id: sell_id,
                price: ask_price,
                quantity: trade_qty,
            };
            trace!(?trade, "cross_match fill");
            trades.push(trade);

            if buy_exhausted {
                self.pop_exhausted_head(Side::Buy, bid_price);
            }
            if sell_exhausted {
                self.pop_exhausted_head(Side::Sell, ask_price);
            }
        }
        if !trades.is_empty() {
            info!(count = trades.len(), "cross_match produced fills");
        }
        trades
    }

    /// Drops a fully-filled head order from its level, compacting the
    /// level away if it's now empty.
    fn pop_exhausted_head(&mut self, side: Side, price: Price) {
        let ladder = self.ladder_mut(side);
        if let Some(queue) = ladder.get_mut(&price) {
            queue.pop_front();
            if queue.is_empty() {
                ladder.remove(&price);
            }
        }
    }

    /// Runs the MARKET "sweep-then-discard" loop against the opposite
    /// ladder. `incoming` is never inserted into the book; any quantity
    /// left unfilled when the opposite ladder runs dry is silently
    /// discarded (logged only here, in debug).
    ///
    /// Unlike `cross_match`, the execution price here is always the
    /// *resting* counterparty's price, symmetric for both directions.
    pub fn sweep_market(&mut self, incoming: &mut Order, ts_ns: u64) -> Vec<Trade> {
        let opposite = incoming.side.opposite();
        let mut trades = Vec::new();

        while incoming.quantity > 0 {
            let Some(level_price) = self.best_of(opposite) else {
                break;
            };

            let (resting_id, trade_qty, resting_exhausted) = {
                let queue = self.ladder_mut(opposite).get_mut(&level_price).unwrap();
                let resting = queue.front_mut().expect("non-empty level");
                let trade_qty = incoming.quantity.min(resting.quantity);
                incoming.quantity -= trade_qty;
                resting.quantity -= trade_qty;
                (resting.id, trade_qty, resting.quantity == 0)
            };

            let (buy_order_id, sell_order_id) = match incoming.side {
                Side::Buy => (incoming.id, resting_id),
                Side::Sell => (resting_id, incoming.id),
            };
            let trade = Trade {
                ts_ns,
                buy_order_id,
                sell_order_id,
                price: level_price,
                quantity: trade_qty,
            };
            trace!(?trade, "sweep_market fill");
            trades.push(trade);

            if resting_exhausted {
                self.pop_exhausted_head(opposite, level_price);
            }
        }

        if incoming.quantity > 0 {
            debug!(
                order_id = incoming.id,
                remaining = incoming.quantity,
                "market order discarded unfilled remainder"
            );
        }
        if !trades.is_empty() {
            info!(count = trades.len(), "sweep_market produced fills");
        } else {
            warn!(order_id = incoming.id, "market order found no liquidity");
        }
        trades
    }

    fn best_of(&self, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.best_bid(),
            Side::Sell => self.best_ask(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderType;

    fn limit(id: u64, side: Side, price: &str, qty: u64, ts_ns: u64) -> Order {
        Order {
            id,
            side,
            order_type: OrderType::Limit,
            price: Some(price.parse().unwrap()),
            quantity: qty,
            ts_ns,
        }
    }

    fn market(id: u64, side: Side, qty: u64, ts_ns: u64) -> Order {
        Order {
            id,
            side,
            order_type: OrderType::Market,
            price: None,
            quantity: qty,
            ts_ns,
        }
    }

    #[test]
    fn s1_simple_cross() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Buy, "101.0", 10, 1));
        ob.insert(limit(2, Side::Sell, "100.5", 5, 2));
        let trades = ob.cross_match(2);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].buy_order_id, 1);
        assert_eq!(trades[0].sell_order_id, 2);
        assert_eq!(trades[0].quantity, 5);
        assert_eq!(trades[0].price, "100.5".parse().unwrap());
        assert_eq!(ob.best_bid().unwrap(), "101.0".parse().unwrap());
        assert!(ob.best_ask().is_none());
    }

    #[test]
    fn s2_multi_level_market_sweep() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Buy, "101.0", 10, 1));
        ob.insert(limit(2, Side::Sell, "100.5", 5, 2));
        ob.insert(limit(3, Side::Sell, "101.0", 7, 3));

        let mut incoming = market(4, Side::Buy, 8, 4);
        let trades = ob.sweep_market(&mut incoming, 4);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].price, "100.5".parse().unwrap());
        assert_eq!(trades[0].quantity, 5);
        assert_eq!(trades[1].price, "101.0".parse().unwrap());
        assert_eq!(trades[1].quantity, 3);

        assert_eq!(ob.best_bid().unwrap(), "101.0".parse().unwrap());
        let remaining: Vec<_> = ob.aggregate(Side::Sell).collect();
        assert_eq!(remaining, vec![("101.0".parse().unwrap(), 4)]);
    }

    #[test]
    fn s3_market_insufficient_liquidity_discards_remainder() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Sell, "100.0", 2, 1));
        let mut incoming = market(9, Side::Buy, 5, 2);
        let trades = ob.sweep_market(&mut incoming, 2);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].quantity, 2);
        assert_eq!(incoming.quantity, 3);
        assert!(ob.best_ask().is_none());
    }

    #[test]
    fn s4_fifo_within_level() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Sell, "100.0", 5, 1));
        ob.insert(limit(2, Side::Sell, "100.0", 5, 2));
        ob.insert(limit(3, Side::Buy, "100.0", 7, 3));
        let trades = ob.cross_match(3);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].sell_order_id, 1);
        assert_eq!(trades[0].quantity, 5);
        assert_eq!(trades[1].sell_order_id, 2);
        assert_eq!(trades[1].quantity, 2);

        let remaining: Vec<_> = ob.aggregate(Side::Sell).collect();
        assert_eq!(remaining, vec![("100.0".parse().unwrap(), 3)]);
    }

    #[test]
    fn s5_cancel_then_no_match() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Buy, "101.0", 10, 1));
        assert!(ob.cancel_order(1));
        ob.insert(limit(2, Side::Sell, "101.0", 5, 2));
        let trades = ob.cross_match(2);
        assert!(trades.is_empty());
        assert!(ob.best_bid().is_none());
        assert_eq!(ob.best_ask().unwrap(), "101.0".parse().unwrap());
    }

    #[test]
    fn s6_non_crossing_limit_rests() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Sell, "100.0", 5, 1));
        ob.insert(limit(2, Side::Buy, "99.0", 3, 2));
        let trades = ob.cross_match(2);
        assert!(trades.is_empty());
        assert_eq!(ob.best_bid().unwrap(), "99.0".parse().unwrap());
    }

    #[test]
    fn idempotent_cancel() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Buy, "101.0", 10, 1));
        assert!(ob.cancel_order(1));
        assert!(!ob.cancel_order(1));
    }

    #[test]
    fn ladder_compaction_after_full_fill() {
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Sell, "100.0", 5, 1));
        ob.insert(limit(2, Side::Buy, "100.0", 5, 2));
        ob.cross_match(2);
        assert!(ob.best_bid().is_none());
        assert!(ob.best_ask().is_none());
    }

    #[test]
    fn cross_match_execution_price_is_always_the_ask() {
        // A crossing SELL aggressor (inserted below the resting bid) still
        // trades at its *own* (ask) price rather than the better resting
        // bid — cross_match's intentionally asymmetric rule.
        let mut ob = OrderBook::new();
        ob.insert(limit(1, Side::Buy, "100.0", 5, 1));
        ob.insert(limit(2, Side::Sell, "90.0", 4, 2));
        let trades = ob.cross_match(2);
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].price, "90.0".parse().unwrap());
    }
}
