//! REST client for snapshot and historical-candle fetches

use tracing::{info, warn};

use crate::error::Result;
use crate::parser::{DepthSnapshot, Kline, KlineInterval};

/// Thin client over the exchange REST API
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    endpoint: String,
}

impl RestClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a full depth snapshot with its sequence cursor
    pub async fn depth_snapshot(&self, symbol: &str, limit: usize) -> Result<DepthSnapshot> {
        let url = format!(
            "{}/depth?symbol={}&limit={}",
            self.endpoint,
            symbol.to_uppercase(),
            limit
        );

        info!(symbol = %symbol, url = %url, "Fetching order book snapshot");

        let snapshot = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<DepthSnapshot>()
            .await?;

        Ok(snapshot)
    }

    /// Fetch historical candles
    ///
    /// Any failure degrades to an empty list so chart history never takes
    /// the live feed down with it.
    pub async fn klines(&self, symbol: &str, interval: KlineInterval, limit: usize) -> Vec<Kline> {
        match self.try_klines(symbol, interval, limit).await {
            Ok(klines) => klines,
            Err(e) => {
                warn!(
                    symbol = %symbol,
                    interval = %interval,
                    error = %e,
                    "Failed to fetch klines, returning empty set"
                );
                Vec::new()
            }
        }
    }

    async fn try_klines(
        &self,
        symbol: &str,
        interval: KlineInterval,
        limit: usize,
    ) -> Result<Vec<Kline>> {
        let url = format!(
            "{}/klines?symbol={}&interval={}&limit={}",
            self.endpoint,
            symbol.to_uppercase(),
            interval,
            limit
        );

        let klines = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Kline>>()
            .await?;

        Ok(klines)
    }
}
