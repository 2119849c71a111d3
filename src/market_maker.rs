//! A two-sided quoting bot plus a direct in-process liquidity helper.
//!
//! The async bot tracks a single engine's mid-price over one WS feed
//! and re-quotes over one REST endpoint. `inject_liquidity` posts a
//! symmetric buy/sell pair straight into the book without going through
//! HTTP at all — useful for seeding a book in tests or a CLI one-shot.

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMsg};
use tokio_util::sync::CancellationToken;

use crate::{
    api::{BookSnapshot, OrderAck, WsFrame},
    engine::Engine,
    errors::MarketMakerError,
    orders::{Order, OrderType, Side},
    price::Price,
};

const SPREAD_TICKS: i64 = 200;
const PACE_MS: u64 = 500;

#[derive(Deserialize, Serialize)]
struct NewOrder {
    side: Side,
    order_type: OrderType,
    price: Option<Price>,
    quantity: u64,
}

fn mid_price(bids: &[(Price, u64)], asks: &[(Price, u64)]) -> Option<Price> {
    let (best_bid, _) = bids.first()?;
    let (best_ask, _) = asks.first()?;
    Some(Price::from_ticks((best_bid.ticks() + best_ask.ticks()) / 2))
}

/// Starts the market maker loop against the REST+WS API at `api_base`.
///
/// Connects to `ws://{api_base}/ws`, tracks the book's mid-price via a
/// `tokio::watch` channel, and every `PACE_MS` milliseconds — if the
/// mid-price has moved since the last quote — cancels its outstanding
/// orders and posts a fresh symmetric bid/ask around the new mid.
pub async fn run_market_maker(api_base: &str, token: CancellationToken) -> Result<(), MarketMakerError> {
    let ws_url = format!("ws://{host}/ws", host = api_base.trim_start_matches("http://"));
    tracing::info!(ws_url, "market maker: connecting");

    let ws_stream = loop {
        match connect_async(&ws_url).await {
            Ok((stream, _)) => {
                tracing::info!("market maker: ws connected");
                break stream;
            }
            Err(e) => {
                tracing::warn!(error = %e, "market maker: ws connect failed, retrying");
                tokio::time::sleep(std::time::Duration::from_millis(100)).await
            }
        }
    };

    let (_write, read) = ws_stream.split();
    let (mid_tx, mid_rx) = watch::channel(None::<Price>);

    let frames = read.filter_map(|msg| async move {
        match msg {
            Ok(WsMsg::Text(txt)) => match serde_json::from_str::<WsFrame>(&txt) {
                Ok(frame) => Some(frame),
                Err(e) => {
                    tracing::warn!(error = %e, "invalid WS frame");
                    None
                }
            },
            _ => None,
        }
    });
    tokio::spawn(async move {
        tokio::pin!(frames);
        while let Some(frame) = frames.next().await {
            if let WsFrame::BookSnapshot(BookSnapshot { bids, asks }) = frame {
                if let Some(mid) = mid_price(&bids, &asks) {
                    let _ = mid_tx.send(Some(mid));
                }
            }
        }
    });

    let client = reqwest::Client::new();
    let mut outstanding: Vec<u64> = Vec::new();
    let mut interval = time::interval(time::Duration::from_millis(PACE_MS));
    let mut last_mid: Option<Price> = None;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                tracing::info!("market maker: shutdown requested, tearing down");
                break;
            }
            _ = interval.tick() => {
                let mid_opt = *mid_rx.borrow();
                let Some(mid) = mid_opt else { continue };
                if Some(mid) == last_mid {
                    continue;
                }

                for id in outstanding.drain(..) {
                    let _ = client.delete(format!("{}/orders/{}", api_base, id)).send().await;
                }

                let bid_price = Price::from_ticks(mid.ticks() - SPREAD_TICKS);
                let ask_price = Price::from_ticks(mid.ticks() + SPREAD_TICKS);

                tracing::info!(%bid_price, "placing bid");
                if let Ok(resp) = client
                    .post(format!("{}/orders", api_base))
                    .json(&NewOrder { side: Side::Buy, order_type: OrderType::Limit, price: Some(bid_price), quantity: 1 })
                    .send()
                    .await
                {
                    if let Ok(ack) = resp.json::<OrderAck>().await {
                        outstanding.push(ack.order_id);
                    }
                }

                tracing::info!(%ask_price, "placing ask");
                if let Ok(resp) = client
                    .post(format!("{}/orders", api_base))
                    .json(&NewOrder { side: Side::Sell, order_type: OrderType::Limit, price: Some(ask_price), quantity: 1 })
                    .send()
                    .await
                {
                    if let Ok(ack) = resp.json::<OrderAck>().await {
                        outstanding.push(ack.order_id);
                    }
                }

                last_mid = Some(mid);
            }
        }
    }
    Ok(())
}

/// Posts a symmetric resting buy/sell pair directly into `engine`,
/// bypassing HTTP entirely.
pub fn inject_liquidity(engine: &mut Engine, mid: Price, spread_ticks: i64, quantity: u64, next_id: &mut u64) {
    let bid_price = Price::from_ticks(mid.ticks() - spread_ticks);
    let ask_price = Price::from_ticks(mid.ticks() + spread_ticks);

    let buy_id = *next_id;
    *next_id += 1;
    if let Err(e) = engine.add_order(Order {
        id: buy_id,
        side: Side::Buy,
        order_type: OrderType::Limit,
        price: Some(bid_price),
        quantity,
        ts_ns: 0,
    }) {
        tracing::warn!(error = %e, "inject_liquidity: bid rejected");
    }

    let sell_id = *next_id;
    *next_id += 1;
    if let Err(e) = engine.add_order(Order {
        id: sell_id,
        side: Side::Sell,
        order_type: OrderType::Limit,
        price: Some(ask_price),
        quantity,
        ts_ns: 0,
    }) {
        tracing::warn!(error = %e, "inject_liquidity: ask rejected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::orders::Side;

    #[test]
    fn inject_liquidity_rests_one_order_each_side() {
        let mut engine = Engine::new(EngineConfig::default());
        let mut next_id = 1u64;
        inject_liquidity(&mut engine, "100.00".parse().unwrap(), 50, 3, &mut next_id);

        let bids = engine.snapshot(Side::Buy);
        let asks = engine.snapshot(Side::Sell);
        assert_eq!(bids, vec![("99.50".parse().unwrap(), 3)]);
        assert_eq!(asks, vec![("100.50".parse().unwrap(), 3)]);
        assert_eq!(next_id, 3);
    }

    #[test]
    fn mid_price_averages_best_bid_and_ask() {
        let bids = vec![("99.00".parse().unwrap(), 1)];
        let asks = vec![("101.00".parse().unwrap(), 1)];
        assert_eq!(mid_price(&bids, &asks), Some("100.00".parse().unwrap()));
    }

    #[test]
    fn mid_price_is_none_without_both_sides() {
        assert_eq!(mid_price(&[], &[("1.00".parse().unwrap(), 1)]), None);
    }
}
