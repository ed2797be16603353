use log::{debug, warn};
use tokio::sync::mpsc::Receiver;

use crate::error::{AppError, Result};
use crate::market::Candle;

/// Outcome of one orchestrator unit, tagged with its batch position.
#[derive(Debug)]
pub struct BatchResult {
    pub index: usize,
    pub result: Result<Vec<Candle>>,
}

impl BatchResult {
    pub fn ok(index: usize, candles: Vec<Candle>) -> Self {
        Self {
            index,
            result: Ok(candles),
        }
    }

    pub fn err(index: usize, error: AppError) -> Self {
        Self {
            index,
            result: Err(error),
        }
    }
}

/// Read exactly `expected` results in arrival order and merge them.
///
/// The first error is returned immediately; remaining producers are not read further.
/// Results with an out-of-range or repeated index are ignored.
pub async fn collect(mut results: Receiver<BatchResult>, expected: usize) -> Result<Vec<Candle>> {
    let mut seen = vec![false; expected];
    let mut received = 0;
    let mut merged = Vec::new();

    while received < expected {
        let Some(batch) = results.recv().await else {
            return Err(AppError::message(format!(
                "batch results ended after {received} of {expected}"
            )));
        };

        match seen.get_mut(batch.index) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                warn!("ignoring unexpected result for batch {}", batch.index);
                continue;
            }
        }
        received += 1;

        match batch.result {
            Ok(candles) => {
                debug!("batch {} delivered {} candles", batch.index, candles.len());
                merged.extend(candles);
            }
            Err(error) => {
                warn!("batch {} failed: {}", batch.index, error);
                return Err(error);
            }
        }
    }

    Ok(merge(merged))
}

/// Sort globally by timestamp and drop repeated timestamps, keeping the first.
pub fn merge(mut candles: Vec<Candle>) -> Vec<Candle> {
    candles.sort_by_key(|candle| candle.timestamp);
    candles.dedup_by_key(|candle| candle.timestamp);
    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn candles(timestamps: &[i64]) -> Vec<Candle> {
        timestamps
            .iter()
            .map(|&timestamp| Candle {
                timestamp,
                open: timestamp as f64,
                high: timestamp as f64,
                low: timestamp as f64,
                close: timestamp as f64,
                volume: 1.0,
            })
            .collect()
    }

    fn timestamps(candles: &[Candle]) -> Vec<i64> {
        candles.iter().map(|candle| candle.timestamp).collect()
    }

    #[tokio::test]
    async fn merges_out_of_order_batches() {
        let (tx, rx) = mpsc::channel(3);
        tx.send(BatchResult::ok(2, candles(&[240, 300]))).await.unwrap();
        tx.send(BatchResult::ok(0, candles(&[0, 60]))).await.unwrap();
        tx.send(BatchResult::ok(1, candles(&[120, 180]))).await.unwrap();

        let merged = collect(rx, 3).await.unwrap();
        assert_eq!(timestamps(&merged), vec![0, 60, 120, 180, 240, 300]);
    }

    #[tokio::test]
    async fn first_error_wins_without_waiting_for_the_rest() {
        let (tx, rx) = mpsc::channel(3);
        tx.send(BatchResult::ok(0, candles(&[0]))).await.unwrap();
        tx.send(BatchResult::err(1, AppError::fetch("coinbase", "HTTP 500")))
            .await
            .unwrap();
        // Batch 2 never reports and the sender stays open.

        let err = collect(rx, 3).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch { .. }));
        drop(tx);
    }

    #[tokio::test]
    async fn cancellation_is_propagated_unchanged() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(BatchResult::err(0, AppError::Cancelled)).await.unwrap();
        assert!(collect(rx, 1).await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn closed_channel_before_all_results_is_an_error() {
        let (tx, rx) = mpsc::channel(2);
        tx.send(BatchResult::ok(0, candles(&[0]))).await.unwrap();
        drop(tx);

        assert!(collect(rx, 2).await.is_err());
    }

    #[tokio::test]
    async fn ignores_duplicate_and_out_of_range_indices() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(BatchResult::ok(0, candles(&[0]))).await.unwrap();
        tx.send(BatchResult::ok(0, candles(&[999]))).await.unwrap();
        tx.send(BatchResult::ok(7, candles(&[777]))).await.unwrap();
        tx.send(BatchResult::ok(1, candles(&[60]))).await.unwrap();

        let merged = collect(rx, 2).await.unwrap();
        assert_eq!(timestamps(&merged), vec![0, 60]);
    }

    #[tokio::test]
    async fn zero_expected_results_is_empty() {
        let (_tx, rx) = mpsc::channel::<BatchResult>(1);
        assert!(collect(rx, 0).await.unwrap().is_empty());
    }

    #[test]
    fn merge_drops_boundary_duplicates() {
        let mut input = candles(&[18_000, 18_060]);
        input.extend(candles(&[17_940, 18_000]));

        let merged = merge(input);
        assert_eq!(timestamps(&merged), vec![17_940, 18_000, 18_060]);
    }
}
