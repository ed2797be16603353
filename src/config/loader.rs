use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::{Context, Result};

use super::{validator, AggregatorConfig, Config, ExchangeConfig, ExchangeKind};

/// Read a JSON configuration file, fill defaults and validate it.
pub fn load_config(path: &Path) -> Result<Config> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config JSON at {}", path.display()))?;

    Ok(parse_config(&json).with_context(|| format!("invalid config at {}", path.display()))?)
}

/// Parse configuration from a JSON string. Every field is optional.
pub fn parse_config(json: &str) -> Result<Config> {
    let raw: RawConfig = serde_json::from_str(json)?;
    let config = raw.into_config();
    validator::validate_config(&config)?;
    Ok(config)
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    aggregator: RawAggregatorConfig,
    #[serde(default)]
    exchanges: Option<Vec<RawExchangeConfig>>,
}

impl RawConfig {
    fn into_config(self) -> Config {
        let builtin = Config::builtin();
        let exchanges = match self.exchanges {
            Some(raw) => raw.into_iter().map(RawExchangeConfig::into_exchange).collect(),
            None => builtin.exchanges,
        };

        Config {
            aggregator: self.aggregator.into_aggregator(),
            exchanges,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawAggregatorConfig {
    max_candles_per_batch: Option<i64>,
    max_concurrent_requests: Option<usize>,
    retry_attempts: Option<u32>,
    backoff_base_ms: Option<u64>,
    backoff_jitter_ms: Option<u64>,
    cache_ttl_secs: Option<u64>,
    request_deadline_secs: Option<u64>,
}

impl RawAggregatorConfig {
    fn into_aggregator(self) -> AggregatorConfig {
        let defaults = AggregatorConfig::default();
        AggregatorConfig {
            max_candles_per_batch: self
                .max_candles_per_batch
                .unwrap_or(defaults.max_candles_per_batch),
            max_concurrent_requests: self
                .max_concurrent_requests
                .unwrap_or(defaults.max_concurrent_requests),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            backoff_base: self
                .backoff_base_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_base),
            backoff_jitter: self
                .backoff_jitter_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_jitter),
            cache_ttl: self
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            request_deadline: self
                .request_deadline_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_deadline),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawExchangeConfig {
    id: String,
    #[serde(rename = "type")]
    kind: RawExchangeKind,
    base_url: String,
    #[serde(default)]
    user_agent: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawExchangeKind {
    Coinbase,
}

impl RawExchangeConfig {
    fn into_exchange(self) -> ExchangeConfig {
        let kind = match self.kind {
            RawExchangeKind::Coinbase => ExchangeKind::Coinbase,
        };
        let mut exchange = ExchangeConfig::coinbase(self.base_url);
        exchange.id = self.id.trim().to_string();
        exchange.kind = kind;
        if let Some(user_agent) = self.user_agent {
            exchange.user_agent = user_agent;
        }
        if let Some(timeout) = self.timeout_secs {
            exchange.timeout = Duration::from_secs(timeout);
        }
        exchange
    }
}
