use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::{CachePruner, CandleCache, FetchOrchestrator};
use crate::market::{Candle, CandleRequest};
use crate::providers::ProviderRegistry;
use crate::search::ProductIndex;

/// Aggregation entry point: owns the shared cache, its pruner and the providers.
pub struct MarketService {
    registry: ProviderRegistry,
    cache: Arc<CandleCache>,
    orchestrator: FetchOrchestrator,
    pruner: Mutex<Option<CachePruner>>,
}

impl MarketService {
    pub fn new(config: &Config, registry: ProviderRegistry) -> Self {
        let cache = Arc::new(CandleCache::new(config.aggregator.cache_ttl));
        let orchestrator = FetchOrchestrator::new(Arc::clone(&cache), config.aggregator.clone());

        Self {
            registry,
            cache,
            orchestrator,
            pruner: Mutex::new(None),
        }
    }

    /// Build the providers from `config` and construct the service around them.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = ProviderRegistry::from_config(config)?;
        Ok(Self::new(config, registry))
    }

    /// Start the background pruner. Calling it again while running is a no-op.
    pub fn start(&self) {
        let mut pruner = self.pruner.lock();
        if pruner.as_ref().is_some_and(CachePruner::is_running) {
            return;
        }
        *pruner = Some(self.cache.spawn_pruner());
        info!("market service started with exchanges {:?}", self.registry.ids());
    }

    /// Stop the pruner and wait for its task to exit.
    pub async fn shutdown(&self) -> Result<()> {
        let pruner = self.pruner.lock().take();
        if let Some(pruner) = pruner {
            pruner.shutdown().await?;
        }
        info!("market service stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.pruner
            .lock()
            .as_ref()
            .is_some_and(CachePruner::is_running)
    }

    /// Candles for `symbol` on `exchange_id` over `[start, end)`, ascending by timestamp.
    ///
    /// Unknown exchanges and unsupported granularities are rejected before any batch is
    /// planned. An empty or inverted range returns no candles without touching a provider.
    pub async fn fetch_candles(
        &self,
        exchange_id: &str,
        symbol: &str,
        start: i64,
        end: i64,
        granularity: i64,
    ) -> Result<Vec<Candle>> {
        let request = CandleRequest::new(exchange_id, symbol, start, end, granularity);
        self.fetch(&request).await
    }

    pub async fn fetch(&self, request: &CandleRequest) -> Result<Vec<Candle>> {
        let provider = self.registry.get(&request.exchange_id)?;
        let timeframe = request.validate()?;

        if request.is_empty_range() {
            debug!("empty range [{}, {}) requested", request.start, request.end);
            return Ok(Vec::new());
        }

        debug!(
            "{} {} {} [{}, {})",
            request.exchange_id, request.symbol, timeframe, request.start, request.end
        );
        self.orchestrator.fetch(provider, request).await
    }

    /// Index the products of every exchange, or of `exchange` only.
    pub async fn product_index(&self, exchange: Option<&str>) -> Result<ProductIndex> {
        ProductIndex::build(&self.registry, exchange).await
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<CandleCache> {
        &self.cache
    }
}
