//! Core order book implementation
//!
//! Uses BTreeMap for sorted price level management. The full snapshot depth
//! is retained; truncation happens only when a view is derived.

use rust_decimal::Decimal;
use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::{Level, OrderBookView, Side};
use crate::parser::{DepthSnapshot, DepthUpdate, PriceLevel};

/// Result of offering a depth delta to the book
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Delta range was contiguous with the cursor and has been applied
    Applied,
    /// Delta is entirely behind the cursor, or no snapshot is loaded;
    /// the book is unchanged
    Stale,
    /// Delta starts beyond the cursor: updates were lost and the book
    /// needs a fresh snapshot. The book is unchanged.
    Gap,
}

/// Order book for a single symbol
#[derive(Debug)]
pub struct OrderBook {
    /// Bids sorted by price descending (highest first)
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    /// Asks sorted by price ascending (lowest first)
    asks: BTreeMap<Decimal, Decimal>,
    /// Last applied update ID
    last_update_id: u64,
    /// Whether the book has been initialized with a snapshot
    snapshot_loaded: bool,
    /// Levels per side in derived views
    view_depth: usize,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(view_depth: usize) -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_id: 0,
            snapshot_loaded: false,
            view_depth,
        }
    }

    /// Replace all state with a snapshot from the REST API
    pub fn load_snapshot(&mut self, snapshot: &DepthSnapshot) {
        self.bids.clear();
        self.asks.clear();

        for level in &snapshot.bids {
            if level.quantity > Decimal::ZERO {
                self.bids.insert(Reverse(level.price), level.quantity);
            }
        }

        for level in &snapshot.asks {
            if level.quantity > Decimal::ZERO {
                self.asks.insert(level.price, level.quantity);
            }
        }

        self.last_update_id = snapshot.last_update_id;
        self.snapshot_loaded = true;
    }

    /// Drop all state and the sequence cursor
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update_id = 0;
        self.snapshot_loaded = false;
    }

    /// Offer a depth delta to the book
    ///
    /// A delta applies only when its range [U, u] is contiguous with the
    /// cursor L: stale when `u <= L`, applicable when `U <= L + 1 <= u`,
    /// otherwise a gap. On `Gap` the caller must reload a snapshot; the
    /// book has not been mutated.
    pub fn apply_delta(&mut self, update: &DepthUpdate) -> DeltaOutcome {
        if !self.snapshot_loaded {
            return DeltaOutcome::Stale;
        }

        if update.final_update_id <= self.last_update_id {
            return DeltaOutcome::Stale;
        }

        if update.first_update_id > self.last_update_id + 1 {
            return DeltaOutcome::Gap;
        }

        for level in &update.bids {
            self.update_side(Side::Bid, level);
        }

        for level in &update.asks {
            self.update_side(Side::Ask, level);
        }

        self.last_update_id = update.final_update_id;
        DeltaOutcome::Applied
    }

    /// Upsert a single price level; zero quantity deletes the level
    fn update_side(&mut self, side: Side, level: &PriceLevel) {
        match side {
            Side::Bid => {
                if level.quantity == Decimal::ZERO {
                    self.bids.remove(&Reverse(level.price));
                } else {
                    self.bids.insert(Reverse(level.price), level.quantity);
                }
            }
            Side::Ask => {
                if level.quantity == Decimal::ZERO {
                    self.asks.remove(&level.price);
                } else {
                    self.asks.insert(level.price, level.quantity);
                }
            }
        }
    }

    /// Whether a snapshot has been loaded
    pub fn is_loaded(&self) -> bool {
        self.snapshot_loaded
    }

    /// Last applied update ID
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    /// Derive the sorted, depth-limited view
    pub fn view(&self) -> OrderBookView {
        OrderBookView {
            bids: self
                .bids
                .iter()
                .take(self.view_depth)
                .map(|(Reverse(price), quantity)| Level {
                    price: *price,
                    quantity: *quantity,
                })
                .collect(),
            asks: self
                .asks
                .iter()
                .take(self.view_depth)
                .map(|(price, quantity)| Level {
                    price: *price,
                    quantity: *quantity,
                })
                .collect(),
        }
    }
}
