//! Error types for the market-data core

use thiserror::Error;

/// Errors produced while synchronizing market data
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("WebSocket connection error: {0}")]
    WebSocketConnection(String),

    #[error("WebSocket message error: {0}")]
    WebSocketMessage(String),

    #[error("Failed to parse message: {0}")]
    Parse(String),

    #[error("REST API error: {0}")]
    RestApi(String),

    #[error("Connection timeout")]
    ConnectionTimeout,
}

impl From<tokio_tungstenite::tungstenite::Error> for MarketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        MarketError::WebSocketConnection(err.to_string())
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for MarketError {
    fn from(err: reqwest::Error) -> Self {
        MarketError::RestApi(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
