//! Order-flow drivers that exercise a running engine over HTTP: a noisy
//! random simulation and a CSV-driven strategy feeder.
//!
//! Both submit orders over the same REST client; the tick feeder reads
//! a `ts_ns,price,volume` CSV and classifies each tick with a
//! deterministic short/long moving-average crossover standing in for a
//! real signal model.

use std::path::Path;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_distr::{Distribution, Exp, Exp1, Normal};
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::price::Price;

#[derive(Clone)]
pub struct SimConfig {
    pub api_base: String,
    pub run_secs: Option<u64>,
    pub attack_rate_hz: f64,
    pub noise_sigma: f64,
    pub mean_qty: f64,
}

#[derive(Deserialize)]
struct Ack {
    trades: Vec<AckTrade>,
}

#[derive(Deserialize)]
struct AckTrade {
    ts_ns: u64,
    buy_order_id: u64,
    sell_order_id: u64,
    price: Price,
    quantity: u64,
}

/// Noisy limit-order simulation loop: quotes randomly around a
/// drifting mid price until `run_secs` elapses or `cancel_token` fires.
pub async fn run_simulation(cfg: SimConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let client: Client = ClientBuilder::new().timeout(Duration::from_secs(5)).build()?;

    let ia = Exp::new(cfg.attack_rate_hz).expect("attack_rate_hz must be > 0");
    let drift = Normal::new(0.0, cfg.noise_sigma).expect("noise_sigma >= 0");
    let size = Exp1;

    let mut iv: i64 = 0;
    let mut pnl: f64 = 0.0;
    let mut mid: f64 = 50.0;
    let start = Instant::now();
    let spread = 1.0_f64;

    loop {
        if let Some(max_secs) = cfg.run_secs {
            if start.elapsed().as_secs() >= max_secs {
                break;
            }
        }

        let wait_secs: f64 = ia.sample(&mut rand::rng());
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("received shutdown; exiting simulation loop");
                break;
            }
            _ = sleep(Duration::from_secs_f64(wait_secs)) => {}
        }

        let unit: f64 = size.sample(&mut rand::rng());
        let qty = (unit * cfg.mean_qty).max(1.0).round() as u64;

        mid += drift.sample(&mut rand::rng());

        let (price, side) = if rand::rng().random_bool(0.5) {
            (mid - spread, "Buy")
        } else {
            (mid + spread, "Sell")
        };
        let price = price.max(0.01);

        match client
            .post(format!("{}/orders", cfg.api_base))
            .json(&json!({
                "side": side,
                "order_type": "Limit",
                "price": price,
                "quantity": qty,
            }))
            .send()
            .await
        {
            Ok(resp) => {
                if let Err(e) = resp.error_for_status_ref() {
                    warn!(error = %e, "order post returned non-success");
                    continue;
                }
                match resp.json::<Ack>().await {
                    Ok(ack) => {
                        for t in ack.trades {
                            let px: f64 = t.price.into();
                            let q = t.quantity as f64;
                            if side == "Buy" {
                                iv -= q as i64;
                                pnl += px * q;
                            } else {
                                iv += q as i64;
                                pnl -= px * q;
                            }
                        }
                        info!(
                            elapsed = format_args!("{:.1}s", start.elapsed().as_secs_f64()),
                            side,
                            qty,
                            price = format_args!("{:.2}", price),
                            mid = format_args!("{:.2}", mid),
                            inventory = iv,
                            pnl = format_args!("{:.2}", pnl),
                            "sim tick"
                        );
                    }
                    Err(e) => warn!(error = %e, "failed to parse order ack"),
                }
            }
            Err(e) => warn!(error = %e, "HTTP request failed"),
        }
    }

    info!(inventory = iv, pnl = format_args!("{:.2}", pnl), "simulation done");
    Ok(())
}

/// One row of the tick input CSV: `ts_ns,price,volume`.
#[derive(Debug, Clone, Deserialize)]
pub struct Tick {
    pub ts_ns: u64,
    pub price: f64,
    pub volume: f64,
}

/// A classifier decision for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    fn as_str(self) -> &'static str {
        match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Hold => "HOLD",
        }
    }

    /// Numeric code for the signal-output CSV: `0=BUY, 1=SELL, 2=HOLD`.
    fn code(self) -> u8 {
        match self {
            Signal::Buy => 0,
            Signal::Sell => 1,
            Signal::Hold => 2,
        }
    }
}

/// A deterministic stand-in for a real signal model: a short/long
/// moving-average crossover. `short`/`long` are the trailing windows of
/// prices seen so far, most recent last.
fn classify(short: &[f64], long: &[f64]) -> Signal {
    if short.is_empty() || long.is_empty() {
        return Signal::Hold;
    }
    let avg = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let fast = avg(short);
    let slow = avg(long);
    let threshold = slow * 0.0005;
    if fast > slow + threshold {
        Signal::Buy
    } else if fast < slow - threshold {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

pub struct FeederConfig {
    pub api_base: String,
    pub ticks_path: std::path::PathBuf,
    pub signal_log_path: Option<std::path::PathBuf>,
    pub executed_log_path: Option<std::path::PathBuf>,
    pub order_quantity: u64,
    pub short_window: usize,
    pub long_window: usize,
}

/// Reads `cfg.ticks_path`, classifies each tick against a trailing
/// short/long price window, and submits a market order via HTTP for
/// every non-`Hold` signal. Writes the signal decisions to
/// `cfg.signal_log_path` if set (`timestamp,price,signal`) and every
/// resulting fill to `cfg.executed_log_path` if set
/// (`ts_ns,side,price,qty,buy_id,sell_id`).
pub async fn run_feeder(cfg: FeederConfig, cancel_token: CancellationToken) -> anyhow::Result<()> {
    let client = ClientBuilder::new().timeout(Duration::from_secs(5)).build()?;

    let mut reader = csv::Reader::from_path(&cfg.ticks_path)?;
    let mut signal_log = match &cfg.signal_log_path {
        Some(path) => match open_signal_log(path) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(?path, error = %e, "could not open signal log, continuing without it");
                None
            }
        },
        None => None,
    };
    let mut executed_log = match &cfg.executed_log_path {
        Some(path) => match open_executed_log(path) {
            Ok(w) => Some(w),
            Err(e) => {
                warn!(?path, error = %e, "could not open executed-trades log, continuing without it");
                None
            }
        },
        None => None,
    };

    let mut history: Vec<f64> = Vec::new();

    for record in reader.deserialize() {
        if cancel_token.is_cancelled() {
            info!("received shutdown; exiting feeder loop");
            break;
        }
        let tick: Tick = record?;
        history.push(tick.price);

        let long_start = history.len().saturating_sub(cfg.long_window);
        let short_start = history.len().saturating_sub(cfg.short_window);
        let signal = classify(&history[short_start..], &history[long_start..]);

        if let Some(writer) = &mut signal_log {
            let _ = writer.write_record([
                tick.ts_ns.to_string(),
                tick.price.to_string(),
                signal.code().to_string(),
            ]);
            let _ = writer.flush();
        }

        if signal == Signal::Hold {
            continue;
        }
        let side = match signal {
            Signal::Buy => "Buy",
            Signal::Sell => "Sell",
            Signal::Hold => unreachable!(),
        };

        match client
            .post(format!("{}/orders", cfg.api_base))
            .json(&json!({
                "side": side,
                "order_type": "Market",
                "quantity": cfg.order_quantity,
            }))
            .send()
            .await
        {
            Ok(resp) => {
                if let Err(e) = resp.error_for_status_ref() {
                    warn!(error = %e, "order post returned non-success");
                } else if let Ok(ack) = resp.json::<Ack>().await {
                    if let Some(writer) = &mut executed_log {
                        for t in &ack.trades {
                            let _ = writer.write_record([
                                t.ts_ns.to_string(),
                                side.to_string(),
                                t.price.to_string(),
                                t.quantity.to_string(),
                                t.buy_order_id.to_string(),
                                t.sell_order_id.to_string(),
                            ]);
                        }
                        let _ = writer.flush();
                    }
                }
            }
            Err(e) => warn!(error = %e, "HTTP request failed"),
        }

        info!(ts_ns = tick.ts_ns, price = tick.price, signal = signal.as_str(), "feeder signal");
    }

    Ok(())
}

fn open_signal_log(path: &Path) -> anyhow::Result<csv::Writer<std::fs::File>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["timestamp", "price", "signal"])?;
    writer.flush()?;
    Ok(writer)
}

fn open_executed_log(path: &Path) -> anyhow::Result<csv::Writer<std::fs::File>> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["ts_ns", "side", "price", "qty", "buy_id", "sell_id"])?;
    writer.flush()?;
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossover_classifies_rising_prices_as_buy() {
        let long = vec![10.0, 10.0, 10.0, 10.0];
        let short = vec![11.0, 11.2];
        assert_eq!(classify(&short, &long), Signal::Buy);
    }

    #[test]
    fn crossover_classifies_falling_prices_as_sell() {
        let long = vec![10.0, 10.0, 10.0, 10.0];
        let short = vec![9.0, 8.8];
        assert_eq!(classify(&short, &long), Signal::Sell);
    }

    #[test]
    fn flat_prices_hold() {
        let long = vec![10.0, 10.0, 10.0];
        let short = vec![10.0, 10.0];
        assert_eq!(classify(&short, &long), Signal::Hold);
    }

    #[test]
    fn empty_history_holds() {
        assert_eq!(classify(&[], &[]), Signal::Hold);
    }
}
