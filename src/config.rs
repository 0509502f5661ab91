//! Configuration for the market-data and trading core

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbol pair to synchronize (e.g. "btcusdt")
    pub symbol: String,

    /// WebSocket endpoint hosting the combined stream
    pub ws_endpoint: String,

    /// REST API endpoint for snapshots and klines
    pub rest_endpoint: String,

    /// Depth levels requested with the REST snapshot
    pub snapshot_limit: usize,

    /// Depth levels per side in emitted book views
    pub depth_levels: usize,

    /// Minimum interval between book view emissions
    pub throttle_interval_ms: u64,

    /// Reconnection policy
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub max_reconnect_attempts: u32,

    /// A connection that is not open within this window counts as failed
    pub connect_timeout_secs: u64,

    /// Path of the JSON state file backing the virtual trading store
    pub store_path: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            symbol: env::var("SYMBOL")
                .unwrap_or_else(|_| "btcusdt".to_string())
                .trim()
                .to_lowercase(),
            ws_endpoint: env::var("WS_ENDPOINT")
                .unwrap_or_else(|_| "wss://stream.binance.com:9443".to_string()),
            rest_endpoint: env::var("REST_ENDPOINT")
                .unwrap_or_else(|_| "https://api.binance.com/api/v3".to_string()),
            snapshot_limit: env::var("SNAPSHOT_LIMIT")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            depth_levels: env::var("DEPTH_LEVELS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            throttle_interval_ms: env::var("THROTTLE_INTERVAL_MS")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .unwrap_or(100),
            reconnect_base_delay_ms: env::var("RECONNECT_BASE_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap_or(1000),
            reconnect_max_delay_ms: env::var("RECONNECT_MAX_DELAY_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()
                .unwrap_or(30000),
            max_reconnect_attempts: env::var("MAX_RECONNECT_ATTEMPTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            connect_timeout_secs: env::var("CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            store_path: env::var("STORE_PATH")
                .unwrap_or_else(|_| "minitrader-state.json".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol: "btcusdt".to_string(),
            ws_endpoint: "wss://stream.binance.com:9443".to_string(),
            rest_endpoint: "https://api.binance.com/api/v3".to_string(),
            snapshot_limit: 1000,
            depth_levels: 20,
            throttle_interval_ms: 100,
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30000,
            max_reconnect_attempts: 10,
            connect_timeout_secs: 10,
            store_path: "minitrader-state.json".to_string(),
        }
    }
}
