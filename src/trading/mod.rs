//! Simulated trading
//!
//! Virtual limit orders matched against the live price stream, with
//! position and balance derived by folding the fill history.

mod matcher;

pub use matcher::{
    OrderMatcher, BALANCE_KEY, INITIAL_BALANCE_KEY, ORDERS_KEY, TRADE_HISTORY_KEY,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Lifecycle state of a virtual order
///
/// Orders never transition back from filled; cancellation removes the
/// order from the collection entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Open,
    Filled,
}

/// Simulated limit order
///
/// After a fill, `price` holds the execution price (the triggering tick),
/// not the original limit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualOrder {
    pub id: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub amount: Decimal,
    pub symbol: String,
    pub status: OrderStatus,
}

/// Append-only fill record, keyed by the filled order's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFill {
    pub id: String,
    pub side: OrderSide,
    /// Execution price at fill time
    pub price: Decimal,
    pub amount: Decimal,
    pub symbol: String,
    /// Fill time (epoch milliseconds)
    pub time: i64,
}

/// Derived holding for one symbol
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub amount: Decimal,
    /// Volume-weighted average cost over buys; zero while flat
    pub avg_price: Decimal,
}
