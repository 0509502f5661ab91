//! Mini Crypto Trader - market data and paper trading core
//!
//! Maintains a gap-free order book view from the exchange's snapshot plus
//! delta feed and matches simulated limit orders against the live price
//! stream, tracking position and balance without risking capital.

pub mod config;
pub mod error;
pub mod orderbook;
pub mod parser;
pub mod rest;
pub mod storage;
pub mod trading;
pub mod websocket;

pub use config::Config;
pub use error::{MarketError, Result};
pub use orderbook::{DeltaOutcome, Level, OrderBook, OrderBookView};
pub use parser::{DepthSnapshot, DepthUpdate, Kline, KlineInterval, ParsedMessage};
pub use rest::RestClient;
pub use storage::{JsonFileStore, KvStore, MemoryStore};
pub use trading::{OrderMatcher, OrderSide, OrderStatus, Position, TradeFill, VirtualOrder};
pub use websocket::{MarketSynchronizer, PriceUpdate, TradeEvent};
