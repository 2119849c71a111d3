//! A label for the single instrument this engine instance trades.
//!
//! Multi-instrument books are out of scope here, so there is exactly
//! one engine and one label — kept only because it's genuinely useful
//! on log lines and in the CSV outputs, not as a routing key.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    BTC,
    ETH,
    USD,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Asset::BTC => "BTC",
            Asset::ETH => "ETH",
            Asset::USD => "USD",
        };
        write!(f, "{s}")
    }
}

/// A base/quote trading pair label, e.g. `BTC-USD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub base: Asset,
    pub quote: Asset,
}

impl Symbol {
    pub const fn new(base: Asset, quote: Asset) -> Self {
        Symbol { base, quote }
    }

    pub fn code(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }

    pub const fn crypto_usd(base: Asset) -> Self {
        Symbol::new(base, Asset::USD)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

pub const BTC_USD: Symbol = Symbol::crypto_usd(Asset::BTC);
pub const ETH_USD: Symbol = Symbol::crypto_usd(Asset::ETH);
