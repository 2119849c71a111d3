//! Shared application state for the HTTP/WS demo surface.
//!
//! Single instrument, single engine (multi-instrument books are out of
//! scope here): the mutex around [`Engine`] is the concession that
//! makes a matcher that isn't safe for concurrent submission safe to
//! expose over `axum` — it serializes callers rather than making the
//! engine itself thread-safe.

use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};

use crate::engine::{Engine, EngineConfig};
use crate::instrument::Symbol;
use crate::trade::Trade;

/// Broadcast capacity for the WS fan-out channels. Slow subscribers drop
/// the oldest frames rather than stalling the engine.
const BROADCAST_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Mutex<Engine>>,
    pub symbol: Symbol,
    pub trade_tx: broadcast::Sender<Trade>,
    pub book_tx: broadcast::Sender<()>,
}

impl AppState {
    pub fn new(symbol: Symbol, config: EngineConfig) -> Self {
        let (trade_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (book_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            engine: Arc::new(Mutex::new(Engine::new(config))),
            symbol,
            trade_tx,
            book_tx,
        }
    }
}
