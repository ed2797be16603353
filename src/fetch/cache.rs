use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use parking_lot::RwLock;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::market::Candle;

/// Identity of one cached batch window. Every field must match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub exchange_id: String,
    pub granularity: i64,
    pub window_start: i64,
}

impl CacheKey {
    pub fn new(
        symbol: impl Into<String>,
        exchange_id: impl Into<String>,
        granularity: i64,
        window_start: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange_id: exchange_id.into(),
            granularity,
            window_start,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    candles: Arc<Vec<Candle>>,
    window_end: i64,
    created_at: Instant,
}

/// In-memory TTL store of fetched batch windows, shared across concurrent requests.
///
/// Lookups take the read lock and never block each other. Inserts and prunes take
/// the write lock for a plain map mutation only; no I/O ever happens under it.
#[derive(Debug)]
pub struct CandleCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ttl: Duration,
}

impl CandleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached candles for `[key.window_start, window_end)`.
    ///
    /// A stored entry only counts as a hit when the window it was fetched for reaches at
    /// least `window_end`; a shorter (clipped) entry cannot answer a longer window.
    /// Entries older than the TTL are treated as missing even before the pruner runs.
    pub fn lookup(&self, key: &CacheKey, window_end: i64) -> Option<Vec<Candle>> {
        let entries = self.entries.read();
        let entry = entries.get(key)?;

        if entry.created_at.elapsed() > self.ttl || entry.window_end < window_end {
            return None;
        }

        Some(
            entry
                .candles
                .iter()
                .filter(|candle| candle.timestamp < window_end)
                .copied()
                .collect(),
        )
    }

    /// Store a fetched window. A later insert for the same key replaces the earlier one.
    pub fn insert(&self, key: CacheKey, window_end: i64, candles: Vec<Candle>) {
        let entry = CacheEntry {
            candles: Arc::new(candles),
            window_end,
            created_at: Instant::now(),
        };
        self.entries.write().insert(key, entry);
    }

    /// Remove every entry older than `ttl`. Returns how many were dropped.
    pub fn prune(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Spawn a background task that prunes the cache every `ttl`.
    ///
    /// The task runs until [`CachePruner::shutdown`] is awaited or the handle is dropped.
    pub fn spawn_pruner(self: &Arc<Self>) -> CachePruner {
        let cache = Arc::clone(self);
        let every = self.ttl;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            info!("starting cache pruner (every {:?})", every);
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let removed = cache.prune(cache.ttl);
                        debug!("pruned {} expired cache entries, {} remain", removed, cache.len());
                    }
                }
            }

            info!("cache pruner stopped");
        });

        CachePruner {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Handle owning the background pruning task.
#[derive(Debug)]
pub struct CachePruner {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CachePruner {
    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(mut self) -> crate::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await?;
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for CachePruner {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles(timestamps: &[i64]) -> Vec<Candle> {
        timestamps
            .iter()
            .map(|&timestamp| Candle {
                timestamp,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1.0,
            })
            .collect()
    }

    fn key(window_start: i64) -> CacheKey {
        CacheKey::new("BTC-USD", "coinbase", 60, window_start)
    }

    #[test]
    fn lookup_requires_exact_key_match() {
        let cache = CandleCache::new(Duration::from_secs(300));
        cache.insert(key(0), 180, candles(&[0, 60, 120]));

        assert_eq!(cache.lookup(&key(0), 180).unwrap().len(), 3);
        assert!(cache.lookup(&key(18_000), 180).is_none());
        assert!(cache
            .lookup(&CacheKey::new("BTC-USD", "coinbase", 300, 0), 180)
            .is_none());
        assert!(cache
            .lookup(&CacheKey::new("ETH-USD", "coinbase", 60, 0), 180)
            .is_none());
        assert!(cache
            .lookup(&CacheKey::new("BTC-USD", "kraken", 60, 0), 180)
            .is_none());
    }

    #[test]
    fn clipped_entry_does_not_answer_a_longer_window() {
        let cache = CandleCache::new(Duration::from_secs(300));
        cache.insert(key(0), 120, candles(&[0, 60]));

        assert!(cache.lookup(&key(0), 180).is_none());
        assert_eq!(cache.lookup(&key(0), 120).unwrap().len(), 2);
    }

    #[test]
    fn longer_entry_is_trimmed_to_the_requested_window() {
        let cache = CandleCache::new(Duration::from_secs(300));
        cache.insert(key(0), 240, candles(&[0, 60, 120, 180]));

        let hit = cache.lookup(&key(0), 120).unwrap();
        assert_eq!(
            hit.iter().map(|c| c.timestamp).collect::<Vec<_>>(),
            vec![0, 60]
        );
    }

    #[test]
    fn empty_window_is_still_a_hit() {
        let cache = CandleCache::new(Duration::from_secs(300));
        cache.insert(key(0), 180, Vec::new());
        assert_eq!(cache.lookup(&key(0), 180), Some(Vec::new()));
    }

    #[tokio::test(start_paused = true)]
    async fn prune_drops_only_expired_entries() {
        let ttl = Duration::from_secs(300);
        let cache = CandleCache::new(ttl);
        cache.insert(key(0), 180, candles(&[0]));

        time::advance(Duration::from_secs(200)).await;
        cache.insert(key(18_000), 18_180, candles(&[18_000]));

        time::advance(Duration::from_secs(101)).await;
        assert_eq!(cache.prune(ttl), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&key(18_000), 18_180).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_miss_before_pruning() {
        let cache = CandleCache::new(Duration::from_secs(10));
        cache.insert(key(0), 180, candles(&[0]));

        time::advance(Duration::from_secs(11)).await;
        assert!(cache.lookup(&key(0), 180).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pruner_runs_every_ttl_and_stops_on_shutdown() {
        let cache = Arc::new(CandleCache::new(Duration::from_secs(60)));
        cache.insert(key(0), 180, candles(&[0]));

        let pruner = cache.spawn_pruner();
        assert!(pruner.is_running());

        // Expired by the second tick at the latest.
        time::sleep(Duration::from_secs(121)).await;
        assert!(cache.is_empty());

        pruner.shutdown().await.unwrap();

        cache.insert(key(0), 180, candles(&[0]));
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_pruner() {
        let cache = Arc::new(CandleCache::new(Duration::from_secs(60)));
        let pruner = cache.spawn_pruner();
        drop(pruner);

        time::sleep(Duration::from_secs(1)).await;
        cache.insert(key(0), 180, candles(&[0]));
        time::sleep(Duration::from_secs(600)).await;
        assert_eq!(cache.len(), 1);
    }
}
