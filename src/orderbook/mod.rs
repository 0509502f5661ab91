//! Order book module
//!
//! Maintains a sequence-consistent order book from snapshot plus depth
//! deltas and derives depth-limited views for consumers.

mod book;

pub use book::{DeltaOutcome, OrderBook};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// A single level in an emitted book view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Depth-limited, sorted order book view
///
/// Bids descend by price, asks ascend; both are truncated to the
/// configured view depth. Only derived from a fully-loaded book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookView {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
}

impl OrderBookView {
    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.first()
    }
}
