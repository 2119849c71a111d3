use thiserror::Error;

/// Errors the engine can report to a caller without mutating book state.
///
/// Submitters are expected to validate their own orders; this engine
/// additionally rejects a narrow set of obviously bad inputs itself
/// rather than letting them reach the book.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("order quantity must be positive, got {0}")]
    NonPositiveQuantity(u64),
    #[error("limit order price must be finite and positive")]
    InvalidLimitPrice,
}

/// Errors from the market-maker bot's REST/WS client loop.
#[derive(Error, Debug)]
pub enum MarketMakerError {
    #[error("websocket connect error: {0}")]
    Connect(String),
    #[error("http request error: {0}")]
    Request(#[from] reqwest::Error),
}
