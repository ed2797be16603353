use futures::stream::{self, StreamExt};
use log::{info, warn};

use crate::error::Result;
use crate::market::Product;
use crate::providers::ProviderRegistry;

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

const LISTING_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
struct IndexedProduct {
    key: String,
    product: Product,
}

/// Instruments sorted by upper-cased display name for prefix lookup.
#[derive(Debug, Clone, Default)]
pub struct ProductIndex {
    entries: Vec<IndexedProduct>,
}

impl ProductIndex {
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mut entries: Vec<IndexedProduct> = products
            .into_iter()
            .map(|product| IndexedProduct {
                key: product.name.to_uppercase(),
                product,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.product.id.cmp(&b.product.id)));
        Self { entries }
    }

    /// List products from every registered provider, or only `exchange` when given.
    ///
    /// A provider that fails to list is skipped; an unknown `exchange` is an error.
    pub async fn build(registry: &ProviderRegistry, exchange: Option<&str>) -> Result<Self> {
        let providers = match exchange {
            Some(id) => vec![registry.get(id)?],
            None => registry.providers().cloned().collect(),
        };

        let listings: Vec<Vec<Product>> = stream::iter(providers)
            .map(|provider| async move {
                match provider.list_products().await {
                    Ok(listed) => {
                        info!("{}: indexed {} products", provider.id(), listed.len());
                        listed
                    }
                    Err(err) => {
                        warn!("{}: skipping product listing: {}", provider.id(), err);
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(LISTING_CONCURRENCY)
            .collect()
            .await;

        let products = listings.into_iter().flatten();
        Ok(Self::from_products(products))
    }

    /// Products whose name starts with `query`, case-insensitively, in name order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<&Product> {
        let prefix = query.trim().to_uppercase();
        if prefix.is_empty() || limit == 0 {
            return Vec::new();
        }

        let first = self
            .entries
            .partition_point(|entry| entry.key.as_str() < prefix.as_str());

        self.entries[first..]
            .iter()
            .take_while(|entry| entry.key.starts_with(&prefix))
            .take(limit)
            .map(|entry| &entry.product)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::market::Candle;
    use crate::providers::ExchangeProvider;
    use async_trait::async_trait;
    use std::sync::Arc;

    fn product(id: &str, name: &str) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            kind: "crypto".to_string(),
            exchange: "coinbase".to_string(),
        }
    }

    fn index() -> ProductIndex {
        ProductIndex::from_products(vec![
            product("ETH-USD", "ETH/USD"),
            product("BTC-EUR", "BTC/EUR"),
            product("BTC-USD", "BTC/USD"),
            product("BCH-USD", "BCH/USD"),
            product("AAVE-USD", "AAVE/USD"),
        ])
    }

    fn ids(products: &[&Product]) -> Vec<String> {
        products.iter().map(|p| p.id.clone()).collect()
    }

    #[test]
    fn matches_prefix_case_insensitively() {
        let index = index();
        assert_eq!(ids(&index.search("btc", 10)), vec!["BTC-EUR", "BTC-USD"]);
        assert_eq!(ids(&index.search("B", 10)), vec!["BCH-USD", "BTC-EUR", "BTC-USD"]);
        assert_eq!(ids(&index.search("btc/u", 10)), vec!["BTC-USD"]);
    }

    #[test]
    fn respects_limit_and_empty_inputs() {
        let index = index();
        assert_eq!(index.search("b", 1).len(), 1);
        assert!(index.search("", 10).is_empty());
        assert!(index.search("   ", 10).is_empty());
        assert!(index.search("btc", 0).is_empty());
        assert!(index.search("zzz", 10).is_empty());
    }

    struct Listing {
        id: &'static str,
        products: Option<Vec<Product>>,
    }

    #[async_trait]
    impl ExchangeProvider for Listing {
        fn id(&self) -> &str {
            self.id
        }

        async fn fetch_candles(&self, _: &str, _: i64, _: i64, _: i64) -> Result<Vec<Candle>> {
            Ok(Vec::new())
        }

        async fn list_products(&self) -> Result<Vec<Product>> {
            self.products
                .clone()
                .ok_or_else(|| AppError::fetch(self.id, "HTTP 503"))
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(Listing {
            id: "good",
            products: Some(vec![product("SOL-USD", "SOL/USD")]),
        }));
        registry.register(Arc::new(Listing {
            id: "down",
            products: None,
        }));
        registry
    }

    #[tokio::test]
    async fn build_skips_failing_providers() {
        let index = ProductIndex::build(&registry(), None).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(ids(&index.search("sol", 10)), vec!["SOL-USD"]);
    }

    #[tokio::test]
    async fn build_for_one_exchange() {
        let index = ProductIndex::build(&registry(), Some("down")).await.unwrap();
        assert!(index.is_empty());

        let err = ProductIndex::build(&registry(), Some("kraken")).await.unwrap_err();
        assert!(err.is_configuration());
    }
}
