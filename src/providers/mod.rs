use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, ExchangeKind};
use crate::error::{AppError, Result};
use crate::market::{Candle, Product};

pub mod coinbase;

pub use coinbase::CoinbaseProvider;

/// Capability every exchange adapter implements. New exchanges are added by
/// implementing this trait and registering the adapter, never by branching on the
/// exchange name in the aggregation core.
#[async_trait]
pub trait ExchangeProvider: Send + Sync {
    fn id(&self) -> &str;

    /// Candles for `[window_start, window_end)`, ascending by timestamp.
    ///
    /// Any failure (transport, status, decode) should surface as [`AppError::Fetch`];
    /// the orchestrator retries all of them the same way.
    async fn fetch_candles(
        &self,
        symbol: &str,
        window_start: i64,
        window_end: i64,
        granularity: i64,
    ) -> Result<Vec<Candle>>;

    /// Instruments tradable on this exchange. Adapters without a listing endpoint return nothing.
    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(Vec::new())
    }
}

/// Collapse any provider error into the opaque fetch failure the orchestrator retries.
pub fn into_fetch_error(exchange: &str, error: AppError) -> AppError {
    if matches!(error, AppError::Fetch { .. }) {
        error
    } else {
        AppError::fetch(exchange, error.to_string())
    }
}

/// Providers keyed by exchange id.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ExchangeProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one adapter per configured exchange.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for exchange in &config.exchanges {
            match exchange.kind {
                ExchangeKind::Coinbase => {
                    registry.register(Arc::new(CoinbaseProvider::from_config(exchange)?))
                }
            }
        }
        Ok(registry)
    }

    /// Add a provider, replacing any previous one with the same id.
    pub fn register(&mut self, provider: Arc<dyn ExchangeProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    pub fn get(&self, exchange_id: &str) -> Result<Arc<dyn ExchangeProvider>> {
        self.providers
            .get(exchange_id)
            .cloned()
            .ok_or_else(|| AppError::UnknownExchange(exchange_id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn ExchangeProvider>> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullProvider(&'static str);

    #[async_trait]
    impl ExchangeProvider for NullProvider {
        fn id(&self) -> &str {
            self.0
        }

        async fn fetch_candles(&self, _: &str, _: i64, _: i64, _: i64) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn unknown_exchange_is_a_configuration_error() {
        let registry = ProviderRegistry::new();
        let err = registry.get("kraken").err().unwrap();
        assert!(matches!(err, AppError::UnknownExchange(ref id) if id == "kraken"));
        assert!(err.is_configuration());
    }

    #[test]
    fn registers_providers_by_id() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(NullProvider("beta")));
        registry.register(Arc::new(NullProvider("alpha")));

        assert_eq!(registry.ids(), vec!["alpha", "beta"]);
        assert_eq!(registry.get("beta").unwrap().id(), "beta");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn builds_coinbase_from_builtin_config() {
        let registry = ProviderRegistry::from_config(&Config::builtin()).unwrap();
        assert_eq!(registry.ids(), vec!["coinbase"]);
    }

    #[tokio::test]
    async fn default_product_listing_is_empty() {
        assert!(NullProvider("x").list_products().await.unwrap().is_empty());
    }

    #[test]
    fn non_fetch_errors_become_fetch_errors() {
        let err = into_fetch_error("coinbase", AppError::message("bad json"));
        assert!(matches!(err, AppError::Fetch { ref exchange, .. } if exchange == "coinbase"));

        let upstream = AppError::fetch("coinbase", "HTTP 500");
        let err = into_fetch_error("coinbase", upstream);
        assert_eq!(err.to_string(), "coinbase fetch failed: HTTP 500");
    }
}
