//! Optional CSV diagnostics gated by a single `debug` flag.
//!
//! Writes are best-effort: a sink that can't be opened, or a write that
//! fails mid-stream, is logged and then silently ignored — matching
//! correctness never depends on these files.
//!
//! Grounded on `original_source/engine_cpp/strategy_runner.cpp`'s
//! commented-out `log_file << ts << "," << price << "," << signal`, turned
//! into a real writer using the `csv` crate rather than hand-rolled
//! string concatenation.

use std::path::Path;

use tracing::warn;

use crate::orderbook::Level;
use crate::orders::Side;
use crate::trade::Trade;

/// Writes the trade log (`ts_ns,buy_id,sell_id,price,qty`) and the book
/// snapshot log (`ts_ns,side,price,qty`).
pub struct DebugSink {
    trade_log: Option<csv::Writer<std::fs::File>>,
    snapshot_log: Option<csv::Writer<std::fs::File>>,
}

impl DebugSink {
    pub fn open(trade_log_path: Option<&Path>, snapshot_log_path: Option<&Path>) -> Self {
        let trade_log = trade_log_path.and_then(|path| match csv::Writer::from_path(path) {
            Ok(mut w) => {
                let _ = w.write_record(["ts_ns", "buy_id", "sell_id", "price", "qty"]);
                let _ = w.flush();
                Some(w)
            }
            Err(e) => {
                warn!(?path, error = %e, "could not open trade log, continuing without it");
                None
            }
        });
        let snapshot_log = snapshot_log_path.and_then(|path| match csv::Writer::from_path(path) {
            Ok(mut w) => {
                let _ = w.write_record(["ts_ns", "side", "price", "qty"]);
                let _ = w.flush();
                Some(w)
            }
            Err(e) => {
                warn!(?path, error = %e, "could not open snapshot log, continuing without it");
                None
            }
        });
        DebugSink {
            trade_log,
            snapshot_log,
        }
    }

    pub fn log_trade(&mut self, trade: &Trade) {
        let Some(writer) = &mut self.trade_log else {
            return;
        };
        let record = [
            trade.ts_ns.to_string(),
            trade.buy_order_id.to_string(),
            trade.sell_order_id.to_string(),
            trade.price.to_string(),
            trade.quantity.to_string(),
        ];
        if let Err(e) = writer.write_record(&record).and_then(|_| writer.flush().map_err(Into::into)) {
            warn!(error = %e, "trade log write failed, continuing");
        }
    }

    /// Writes one row per level of a book snapshot.
    pub fn log_snapshot(&mut self, ts_ns: u64, side: Side, levels: &[Level]) {
        let Some(writer) = &mut self.snapshot_log else {
            return;
        };
        let side_label = match side {
            Side::Buy => "BID",
            Side::Sell => "ASK",
        };
        for (price, qty) in levels {
            let record = [ts_ns.to_string(), side_label.to_string(), price.to_string(), qty.to_string()];
            if let Err(e) = writer.write_record(&record) {
                warn!(error = %e, "snapshot log write failed, continuing");
                return;
            }
        }
        let _ = writer.flush();
    }
}
