pub mod cache;
pub mod orchestrator;
pub mod planner;
pub mod reassemble;
pub mod retry;

pub use cache::{CacheKey, CachePruner, CandleCache};
pub use orchestrator::FetchOrchestrator;
pub use planner::{plan, Batch};
pub use reassemble::{collect, merge, BatchResult};
pub use retry::{retry_with_backoff, RetryPolicy};

/// A zero limit would never admit a batch; treat it as one.
#[inline]
pub fn ensure_concurrency_limit(limit: usize) -> usize {
    limit.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_limit_is_at_least_one() {
        assert_eq!(ensure_concurrency_limit(0), 1);
        assert_eq!(ensure_concurrency_limit(10), 10);
    }
}
