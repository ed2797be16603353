use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::config::ExchangeConfig;
use crate::error::{AppError, Context, Result};
use crate::market::{Candle, Product};

use super::ExchangeProvider;

/// Coinbase Exchange public REST adapter.
///
/// Candles come back newest-first as `[time, low, high, open, close, volume]` rows.
/// The `end` query parameter is inclusive upstream, so requests ask for the last
/// candle start inside the window rather than the window end itself.
#[derive(Debug, Clone)]
pub struct CoinbaseProvider {
    id: String,
    base_url: String,
    user_agent: String,
    client: Client,
}

impl CoinbaseProvider {
    pub fn from_config(config: &ExchangeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to construct Coinbase HTTP client")?;

        Ok(Self {
            id: config.id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            client,
        })
    }

    /// Point an adapter at an arbitrary base URL, e.g. a mock server.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Self::from_config(&ExchangeConfig::coinbase(base_url))
    }

    fn fetch_error(&self, message: impl Into<String>) -> AppError {
        AppError::fetch(self.id.as_str(), message)
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| self.fetch_error(format!("invalid base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| self.fetch_error(format!("base url {} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, url: Url, query: &[(&str, String)]) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| self.fetch_error(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.fetch_error(format!("failed to read body from {url}: {e}")))?;

        if !status.is_success() {
            return Err(self.fetch_error(format!("HTTP {status}: {}", body.trim())));
        }

        Ok(body)
    }
}

#[async_trait]
impl ExchangeProvider for CoinbaseProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        window_start: i64,
        window_end: i64,
        granularity: i64,
    ) -> Result<Vec<Candle>> {
        let url = self.endpoint(&["products", symbol, "candles"])?;
        let last_open = window_end.saturating_sub(granularity).max(window_start);
        let query = [
            ("granularity", granularity.to_string()),
            ("start", window_start.to_string()),
            ("end", last_open.to_string()),
        ];

        let body = self.get_text(url, &query).await?;
        let candles = parse_candles(&body, window_start, window_end)
            .map_err(|e| self.fetch_error(format!("malformed candles for {symbol}: {e}")))?;

        debug!(
            "{}: {} candles for {} [{}, {})",
            self.id,
            candles.len(),
            symbol,
            window_start,
            window_end
        );

        Ok(candles)
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let url = self.endpoint(&["products"])?;
        let body = self.get_text(url, &[]).await?;
        let raw: Vec<RawProduct> = serde_json::from_str(&body)
            .map_err(|e| self.fetch_error(format!("malformed product list: {e}")))?;

        Ok(raw
            .into_iter()
            .filter(|product| !product.is_delisted())
            .map(|product| product.into_product(&self.id))
            .collect())
    }
}

/// Decode candle rows, skip short rows, keep `[window_start, window_end)` and sort ascending.
fn parse_candles(body: &str, window_start: i64, window_end: i64) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<Value>> = serde_json::from_str(body)?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 6 {
            continue;
        }

        let numbers = row[..6]
            .iter()
            .map(Value::as_f64)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| AppError::message("candle row contains a non-numeric field"))?;

        let timestamp = numbers[0] as i64;
        if timestamp < window_start || timestamp >= window_end {
            continue;
        }

        candles.push(Candle {
            timestamp,
            low: numbers[1],
            high: numbers[2],
            open: numbers[3],
            close: numbers[4],
            volume: numbers[5],
        });
    }

    candles.sort_by_key(|candle| candle.timestamp);
    Ok(candles)
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    id: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    trading_disabled: bool,
}

impl RawProduct {
    fn is_delisted(&self) -> bool {
        self.trading_disabled || self.status.as_deref() == Some("delisted")
    }

    fn into_product(self, exchange: &str) -> Product {
        let name = self
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.id.clone());

        Product {
            id: self.id,
            name,
            kind: "crypto".to_string(),
            exchange: exchange.to_string(),
        }
    }
}
