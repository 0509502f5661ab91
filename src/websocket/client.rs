//! WebSocket client for the exchange combined stream
//!
//! Handles connection, subscription, and message reception for one symbol.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, error, warn};

use crate::error::{MarketError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The three logical channels multiplexed on one transport
const STREAM_SUFFIXES: [&str; 3] = ["depth@100ms", "trade", "ticker"];

/// WebSocket client for a single symbol's combined stream
pub struct WebSocketClient {
    stream: Option<WsStream>,
    endpoint: String,
    symbol: String,
}

impl WebSocketClient {
    /// Create a new client for `symbol` (lowercase pair, e.g. "btcusdt")
    pub fn new(endpoint: &str, symbol: &str) -> Self {
        Self {
            stream: None,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            symbol: symbol.to_lowercase(),
        }
    }

    fn stream_url(&self) -> String {
        let streams: Vec<String> = STREAM_SUFFIXES
            .iter()
            .map(|suffix| format!("{}@{}", self.symbol, suffix))
            .collect();
        format!("{}/stream?streams={}", self.endpoint, streams.join("/"))
    }

    /// Connect and subscribe to the depth, trade and ticker channels
    pub async fn connect(&mut self) -> Result<()> {
        let url = self.stream_url();
        debug!(url = %url, "Connecting to market stream");

        let (ws_stream, response) = connect_async(&url).await.map_err(|e| {
            MarketError::WebSocketConnection(format!("Failed to connect: {}", e))
        })?;

        debug!(status = ?response.status(), "Market stream connected");
        self.stream = Some(ws_stream);

        Ok(())
    }

    /// Receive the next text payload; `None` for control frames
    pub async fn recv(&mut self) -> Result<Option<String>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| MarketError::WebSocketConnection("Not connected".to_string()))?;

        match stream.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(text)),
            Some(Ok(Message::Binary(data))) => {
                Ok(Some(String::from_utf8_lossy(&data).to_string()))
            }
            Some(Ok(Message::Ping(data))) => {
                if let Some(stream) = self.stream.as_mut() {
                    let _ = stream.send(Message::Pong(data)).await;
                }
                Ok(None)
            }
            Some(Ok(Message::Pong(_))) => Ok(None),
            Some(Ok(Message::Close(frame))) => {
                warn!(frame = ?frame, "Received close frame");
                self.stream = None;
                Err(MarketError::WebSocketConnection(
                    "Connection closed".to_string(),
                ))
            }
            Some(Ok(Message::Frame(_))) => Ok(None),
            Some(Err(e)) => {
                error!(error = %e, "WebSocket error");
                self.stream = None;
                Err(MarketError::WebSocketMessage(e.to_string()))
            }
            None => {
                warn!("WebSocket stream ended");
                self.stream = None;
                Err(MarketError::WebSocketConnection(
                    "Stream ended".to_string(),
                ))
            }
        }
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Close the connection
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_stream_url_covers_all_channels() {
        let client = WebSocketClient::new("wss://stream.example.com:9443/", "BTCUSDT");
        assert_eq!(
            client.stream_url(),
            "wss://stream.example.com:9443/stream?streams=btcusdt@depth@100ms/btcusdt@trade/btcusdt@ticker"
        );
    }
}
