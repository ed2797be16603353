use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};
use tokio::sync::{mpsc, Semaphore};
use tokio::time::{timeout_at, Instant};

use crate::config::AggregatorConfig;
use crate::error::{AppError, Result};
use crate::market::{Candle, CandleRequest};
use crate::providers::{into_fetch_error, ExchangeProvider};

use super::cache::{CacheKey, CandleCache};
use super::planner::{plan, Batch};
use super::reassemble::{collect, BatchResult};
use super::retry::{retry_with_backoff, RetryPolicy};
use super::ensure_concurrency_limit;

/// Fans a request out into one unit per planned batch and gathers the results.
///
/// Each call owns its own admission gate of `max_concurrent_requests` permits and one
/// deadline of `request_deadline`; the cache is the only state shared between calls.
#[derive(Debug, Clone)]
pub struct FetchOrchestrator {
    cache: Arc<CandleCache>,
    config: AggregatorConfig,
    retry: RetryPolicy,
}

impl FetchOrchestrator {
    pub fn new(cache: Arc<CandleCache>, config: AggregatorConfig) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            cache,
            config,
            retry,
        }
    }

    pub fn cache(&self) -> &Arc<CandleCache> {
        &self.cache
    }

    /// Fetch every batch of `request` and return one ascending candle sequence.
    pub async fn fetch(
        &self,
        provider: Arc<dyn ExchangeProvider>,
        request: &CandleRequest,
    ) -> Result<Vec<Candle>> {
        let batches = plan(request, self.config.max_candles_per_batch)?;
        if batches.is_empty() {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + self.config.request_deadline;
        let expected = batches.len();
        info!(
            "fetching {} {} candles from {} in {} batches",
            request.symbol, request.granularity, request.exchange_id, expected
        );

        let results = self.dispatch(provider, request, batches, deadline);
        let candles = collect(results, expected).await?;

        info!(
            "assembled {} candles for {} {}",
            candles.len(),
            request.symbol,
            request.granularity
        );
        Ok(candles)
    }

    /// Spawn one unit per batch. The channel holds every possible result, so a unit
    /// never blocks on a consumer that stopped reading after the first error.
    fn dispatch(
        &self,
        provider: Arc<dyn ExchangeProvider>,
        request: &CandleRequest,
        batches: Vec<Batch>,
        deadline: Instant,
    ) -> mpsc::Receiver<BatchResult> {
        let (tx, rx) = mpsc::channel(batches.len());
        let gate = Arc::new(Semaphore::new(ensure_concurrency_limit(
            self.config.max_concurrent_requests,
        )));

        for batch in batches {
            let unit = BatchUnit {
                batch,
                key: CacheKey::new(
                    request.symbol.as_str(),
                    request.exchange_id.as_str(),
                    request.granularity,
                    batch.window_start,
                ),
                granularity: request.granularity,
                provider: Arc::clone(&provider),
                cache: Arc::clone(&self.cache),
                gate: Arc::clone(&gate),
                retry: self.retry,
                deadline,
            };
            let tx = tx.clone();

            tokio::spawn(async move {
                let index = unit.batch.index;
                let result = unit.run().await;
                let _ = tx.send(BatchResult { index, result }).await;
            });
        }

        rx
    }
}

struct BatchUnit {
    batch: Batch,
    key: CacheKey,
    granularity: i64,
    provider: Arc<dyn ExchangeProvider>,
    cache: Arc<CandleCache>,
    gate: Arc<Semaphore>,
    retry: RetryPolicy,
    deadline: Instant,
}

impl BatchUnit {
    async fn run(self) -> Result<Vec<Candle>> {
        let Batch {
            index,
            window_start,
            window_end,
        } = self.batch;

        if let Some(candles) = self.cache.lookup(&self.key, window_end) {
            debug!("cache hit: {:?} (batch {index})", self.key);
            return Ok(candles);
        }
        debug!("cache miss: {:?} (batch {index})", self.key);

        let _permit = match timeout_at(self.deadline, self.gate.acquire()).await {
            Err(_elapsed) => return Err(AppError::Cancelled),
            Ok(permit) => permit.map_err(|_| AppError::message("admission gate closed"))?,
        };

        let label = format!("{} batch {index}", self.provider.id());
        let provider = &self.provider;
        let symbol = self.key.symbol.as_str();
        let granularity = self.granularity;

        let candles = retry_with_backoff(&self.retry, self.deadline, &label, || async move {
            provider
                .fetch_candles(symbol, window_start, window_end, granularity)
                .await
                .map_err(|error| into_fetch_error(provider.id(), error))
        })
        .await?;

        if window_end <= Utc::now().timestamp() {
            self.cache.insert(self.key, window_end, candles.clone());
        } else {
            debug!("not caching open window ending at {window_end} (batch {index})");
        }

        Ok(candles)
    }
}
