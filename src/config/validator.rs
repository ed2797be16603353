use std::collections::HashSet;

use crate::error::{AppError, Result};

use super::{AggregatorConfig, Config, ExchangeConfig};

/// Largest accepted batch size. Keeps `granularity * max_candles_per_batch` far from `i64` limits.
pub const MAX_CANDLES_PER_BATCH_LIMIT: i64 = 10_000;

/// Validate a loaded configuration and surface every issue at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    validate_aggregator(&config.aggregator, &mut issues);
    validate_exchanges(&config.exchanges, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_aggregator(aggregator: &AggregatorConfig, issues: &mut Vec<String>) {
    if aggregator.max_candles_per_batch <= 0 {
        issues.push(format!(
            "aggregator.max_candles_per_batch must be positive, got {}",
            aggregator.max_candles_per_batch
        ));
    } else if aggregator.max_candles_per_batch > MAX_CANDLES_PER_BATCH_LIMIT {
        issues.push(format!(
            "aggregator.max_candles_per_batch must be at most {}, got {}",
            MAX_CANDLES_PER_BATCH_LIMIT, aggregator.max_candles_per_batch
        ));
    }
    if aggregator.max_concurrent_requests == 0 {
        issues.push("aggregator.max_concurrent_requests must be at least 1".to_string());
    }
    if aggregator.retry_attempts == 0 {
        issues.push("aggregator.retry_attempts must be at least 1".to_string());
    }
    if aggregator.cache_ttl.is_zero() {
        issues.push("aggregator.cache_ttl_secs must be positive".to_string());
    }
    if aggregator.request_deadline.is_zero() {
        issues.push("aggregator.request_deadline_secs must be positive".to_string());
    }
}

fn validate_exchanges(exchanges: &[ExchangeConfig], issues: &mut Vec<String>) {
    if exchanges.is_empty() {
        issues.push("at least one exchange must be configured".to_string());
    }

    let mut seen = HashSet::new();
    for exchange in exchanges {
        if exchange.id.is_empty() {
            issues.push("exchange id must not be empty".to_string());
        } else if !seen.insert(exchange.id.as_str()) {
            issues.push(format!("exchange `{}` is configured twice", exchange.id));
        }

        if exchange.base_url.trim().is_empty() {
            issues.push(format!("exchange `{}` has an empty base_url", exchange.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_is_valid() {
        assert!(validate_config(&Config::builtin()).is_ok());
    }

    #[test]
    fn aggregates_every_issue() {
        let mut config = Config::builtin();
        config.aggregator.max_candles_per_batch = 0;
        config.aggregator.retry_attempts = 0;
        config.exchanges.push(config.exchanges[0].clone());

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("max_candles_per_batch"));
        assert!(message.contains("retry_attempts"));
        assert!(message.contains("configured twice"));
    }

    #[test]
    fn rejects_oversized_batches() {
        let mut config = Config::builtin();
        config.aggregator.max_candles_per_batch = i64::MAX;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("at most 10000"), "{message}");

        config.aggregator.max_candles_per_batch = MAX_CANDLES_PER_BATCH_LIMIT;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_empty_exchange_list() {
        let mut config = Config::builtin();
        config.exchanges.clear();
        assert!(validate_config(&config).is_err());
    }
}
