use std::time::Duration;

pub mod loader;
pub mod validator;

pub use loader::{load_config, parse_config};

pub const DEFAULT_MAX_CANDLES_PER_BATCH: i64 = 300;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(200);
pub const DEFAULT_BACKOFF_JITTER: Duration = Duration::from_millis(50);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(30);

const COINBASE_BASE_URL: &str = "https://api.exchange.coinbase.com";
const DEFAULT_USER_AGENT: &str = "candle-cli";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Tunables for batch planning, fan-out, retry and caching.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorConfig {
    pub max_candles_per_batch: i64,
    pub max_concurrent_requests: usize,
    pub retry_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_jitter: Duration,
    pub cache_ttl: Duration,
    pub request_deadline: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_candles_per_batch: DEFAULT_MAX_CANDLES_PER_BATCH,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_jitter: DEFAULT_BACKOFF_JITTER,
            cache_ttl: DEFAULT_CACHE_TTL,
            request_deadline: DEFAULT_REQUEST_DEADLINE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Coinbase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeConfig {
    pub id: String,
    pub kind: ExchangeKind,
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ExchangeConfig {
    pub fn coinbase(base_url: impl Into<String>) -> Self {
        Self {
            id: "coinbase".to_string(),
            kind: ExchangeKind::Coinbase,
            base_url: base_url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub aggregator: AggregatorConfig,
    pub exchanges: Vec<ExchangeConfig>,
}

impl Config {
    pub fn builtin() -> Self {
        Config {
            aggregator: AggregatorConfig::default(),
            exchanges: vec![ExchangeConfig::coinbase(COINBASE_BASE_URL)],
        }
    }

    pub fn exchange(&self, id: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|exchange| exchange.id == id)
    }
}
