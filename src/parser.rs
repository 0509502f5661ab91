//! Parser module for exchange stream messages
//!
//! Handles deserialization of depth deltas, trade ticks, best-price tickers
//! and historical klines. Wire field names (`U`, `u`, `b`, `a`, `p`, `q`,
//! `T`, `m`, `c`, `E`, `lastUpdateId`) are part of the exchange contract.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;

/// Incremental depth delta scoped to a closed sequence range
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// First update ID covered by this delta
    #[serde(rename = "U")]
    pub first_update_id: u64,

    /// Final update ID covered by this delta
    #[serde(rename = "u")]
    pub final_update_id: u64,

    /// Bid levels to upsert or delete
    #[serde(rename = "b", deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevel>,

    /// Ask levels to upsert or delete
    #[serde(rename = "a", deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevel>,
}

/// Executed trade tick
#[derive(Debug, Clone, Deserialize)]
pub struct TradeTick {
    #[serde(rename = "p", deserialize_with = "deserialize_decimal")]
    pub price: Decimal,

    #[serde(rename = "q", deserialize_with = "deserialize_decimal")]
    pub quantity: Decimal,

    /// Trade time (epoch milliseconds)
    #[serde(rename = "T")]
    pub trade_time: u64,

    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// Best-price ticker tick
#[derive(Debug, Clone, Deserialize)]
pub struct TickerTick {
    /// Last traded price
    #[serde(rename = "c", deserialize_with = "deserialize_decimal")]
    pub last_price: Decimal,

    /// Event time (epoch milliseconds)
    #[serde(rename = "E")]
    pub event_time: u64,
}

/// Price level (price, quantity pair)
#[derive(Debug, Clone, PartialEq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Order book snapshot from the REST API
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshot {
    /// Sequence cursor the snapshot is consistent with
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,

    #[serde(deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<PriceLevel>,

    #[serde(deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<PriceLevel>,
}

/// Combined stream message wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct StreamMessage {
    /// Stream name, e.g. "btcusdt@depth@100ms"
    pub stream: String,

    /// Data payload
    pub data: serde_json::Value,
}

/// Inbound stream message routed by stream-name suffix
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    Depth(DepthUpdate),
    Trade(TradeTick),
    Ticker(TickerTick),
    Unknown(String),
}

impl ParsedMessage {
    /// Parse a raw combined-stream message
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        let message: StreamMessage = serde_json::from_str(raw)?;
        Self::from_stream(&message.stream, message.data)
    }

    fn from_stream(stream: &str, data: serde_json::Value) -> Result<Self, serde_json::Error> {
        if stream.ends_with("@depth@100ms") {
            Ok(ParsedMessage::Depth(serde_json::from_value(data)?))
        } else if stream.ends_with("@trade") {
            Ok(ParsedMessage::Trade(serde_json::from_value(data)?))
        } else if stream.ends_with("@ticker") {
            Ok(ParsedMessage::Ticker(serde_json::from_value(data)?))
        } else {
            Ok(ParsedMessage::Unknown(stream.to_string()))
        }
    }
}

/// Kline/candlestick intervals accepted by the REST API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl KlineInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::OneMinute => "1m",
            KlineInterval::FiveMinutes => "5m",
            KlineInterval::FifteenMinutes => "15m",
            KlineInterval::OneHour => "1h",
            KlineInterval::FourHours => "4h",
            KlineInterval::OneDay => "1d",
        }
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KlineInterval {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(KlineInterval::OneMinute),
            "5m" => Ok(KlineInterval::FiveMinutes),
            "15m" => Ok(KlineInterval::FifteenMinutes),
            "1h" => Ok(KlineInterval::OneHour),
            "4h" => Ok(KlineInterval::FourHours),
            "1d" => Ok(KlineInterval::OneDay),
            other => Err(MarketError::Parse(format!("unknown interval: {other}"))),
        }
    }
}

/// Historical candle. The wire form is a fixed-position tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
    pub quote_volume: Decimal,
    pub trade_count: u64,
    pub taker_buy_base_volume: Decimal,
    pub taker_buy_quote_volume: Decimal,
}

impl<'de> Deserialize<'de> for Kline {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Row(
            i64,
            String,
            String,
            String,
            String,
            String,
            i64,
            String,
            u64,
            String,
            String,
            serde::de::IgnoredAny,
        );

        fn dec<E: serde::de::Error>(s: &str) -> Result<Decimal, E> {
            Decimal::from_str(s).map_err(serde::de::Error::custom)
        }

        let row = Row::deserialize(deserializer)?;
        Ok(Kline {
            open_time: row.0,
            open: dec(&row.1)?,
            high: dec(&row.2)?,
            low: dec(&row.3)?,
            close: dec(&row.4)?,
            volume: dec(&row.5)?,
            close_time: row.6,
            quote_volume: dec(&row.7)?,
            trade_count: row.8,
            taker_buy_base_volume: dec(&row.9)?,
            taker_buy_quote_volume: dec(&row.10)?,
        })
    }
}

/// Custom deserializer for Decimal from a JSON string
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Decimal::from_str(&s).map_err(serde::de::Error::custom)
}

/// Custom deserializer for price levels from an array of string pairs
fn deserialize_price_levels<'de, D>(deserializer: D) -> Result<Vec<PriceLevel>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            Ok(PriceLevel {
                price: Decimal::from_str(&pair[0]).map_err(serde::de::Error::custom)?,
                quantity: Decimal::from_str(&pair[1]).map_err(serde::de::Error::custom)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parse_depth_stream_message() {
        let raw = r#"{
            "stream": "btcusdt@depth@100ms",
            "data": {
                "U": 100,
                "u": 105,
                "b": [["50000.00", "1.5"], ["49999.00", "0"]],
                "a": [["50001.00", "1.0"]]
            }
        }"#;

        let msg = ParsedMessage::parse(raw).unwrap();
        match msg {
            ParsedMessage::Depth(depth) => {
                assert_eq!(depth.first_update_id, 100);
                assert_eq!(depth.final_update_id, 105);
                assert_eq!(depth.bids.len(), 2);
                assert_eq!(depth.bids[0].price, dec!(50000.00));
                assert_eq!(depth.bids[1].quantity, Decimal::ZERO);
                assert_eq!(depth.asks.len(), 1);
            }
            other => panic!("expected Depth, got {other:?}"),
        }
    }

    #[test]
    fn parse_trade_stream_message() {
        let raw = r#"{
            "stream": "btcusdt@trade",
            "data": {
                "p": "50000.50",
                "q": "0.5",
                "T": 1672531200000,
                "m": false
            }
        }"#;

        let msg = ParsedMessage::parse(raw).unwrap();
        match msg {
            ParsedMessage::Trade(trade) => {
                assert_eq!(trade.price, dec!(50000.50));
                assert_eq!(trade.quantity, dec!(0.5));
                assert_eq!(trade.trade_time, 1672531200000);
                assert!(!trade.is_buyer_maker);
            }
            other => panic!("expected Trade, got {other:?}"),
        }
    }

    #[test]
    fn parse_ticker_stream_message() {
        let raw = r#"{
            "stream": "btcusdt@ticker",
            "data": { "c": "50123.45", "E": 1672531201000 }
        }"#;

        let msg = ParsedMessage::parse(raw).unwrap();
        match msg {
            ParsedMessage::Ticker(ticker) => {
                assert_eq!(ticker.last_price, dec!(50123.45));
                assert_eq!(ticker.event_time, 1672531201000);
            }
            other => panic!("expected Ticker, got {other:?}"),
        }
    }

    #[test]
    fn unknown_stream_suffix_is_preserved() {
        let raw = r#"{ "stream": "btcusdt@kline_1m", "data": {} }"#;
        let msg = ParsedMessage::parse(raw).unwrap();
        match msg {
            ParsedMessage::Unknown(stream) => assert_eq!(stream, "btcusdt@kline_1m"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn parse_snapshot() {
        let raw = r#"{
            "lastUpdateId": 160,
            "bids": [["50000.00", "1.0"]],
            "asks": [["50001.00", "2.0"]]
        }"#;

        let snapshot: DepthSnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.last_update_id, 160);
        assert_eq!(snapshot.bids[0].price, dec!(50000.00));
        assert_eq!(snapshot.asks[0].quantity, dec!(2.0));
    }

    #[test]
    fn parse_kline_row() {
        let raw = r#"[
            1672531200000,
            "50000.0", "50100.0", "49900.0", "50050.0", "123.456",
            1672534799999,
            "6175000.0",
            4321,
            "60.0", "3000000.0",
            "0"
        ]"#;

        let kline: Kline = serde_json::from_str(raw).unwrap();
        assert_eq!(kline.open_time, 1672531200000);
        assert_eq!(kline.open, dec!(50000.0));
        assert_eq!(kline.close, dec!(50050.0));
        assert_eq!(kline.volume, dec!(123.456));
        assert_eq!(kline.trade_count, 4321);
    }

    #[test]
    fn kline_interval_round_trip() {
        for (s, interval) in [
            ("1m", KlineInterval::OneMinute),
            ("5m", KlineInterval::FiveMinutes),
            ("15m", KlineInterval::FifteenMinutes),
            ("1h", KlineInterval::OneHour),
            ("4h", KlineInterval::FourHours),
            ("1d", KlineInterval::OneDay),
        ] {
            assert_eq!(s.parse::<KlineInterval>().unwrap(), interval);
            assert_eq!(interval.as_str(), s);
        }
        assert!("2w".parse::<KlineInterval>().is_err());
    }
}
