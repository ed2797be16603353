use crate::error::{AppError, Result};
use crate::market::CandleRequest;

/// One grid-aligned slice `[window_start, window_end)` of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch {
    pub index: usize,
    pub window_start: i64,
    pub window_end: i64,
}

impl Batch {
    /// True when the window was clipped to the request end and is shorter than a full block.
    pub fn is_clipped(&self, block_duration: i64) -> bool {
        self.window_end - self.window_start < block_duration
    }
}

/// Split a request into windows of at most `max_candles_per_batch` candles.
///
/// Windows are aligned to multiples of `granularity * max_candles_per_batch`, so
/// overlapping requests land on identical windows and share cache entries. The
/// first window may start before `request.start`; the last one is clipped at
/// `request.end`. An empty or inverted range plans to nothing. A grid that does
/// not fit in `i64` around the requested range is an [`AppError::InvalidRequest`].
pub fn plan(request: &CandleRequest, max_candles_per_batch: i64) -> Result<Vec<Batch>> {
    if request.is_empty_range() || request.granularity <= 0 || max_candles_per_batch <= 0 {
        return Ok(Vec::new());
    }

    let block_duration = block_duration(request.granularity, max_candles_per_batch)
        .ok_or_else(|| {
            AppError::InvalidRequest(format!(
                "batch of {max_candles_per_batch} candles at {}s overflows the timestamp range",
                request.granularity
            ))
        })?;
    let aligned_start = align_to_grid(request.start, block_duration).ok_or_else(|| {
        AppError::InvalidRequest(format!(
            "start {} cannot be aligned to a {block_duration}s grid",
            request.start
        ))
    })?;

    let mut batches = Vec::new();
    let mut window_start = aligned_start;
    while window_start < request.end {
        let next_start = window_start.checked_add(block_duration);
        let window_end = next_start.map_or(request.end, |next| next.min(request.end));
        batches.push(Batch {
            index: batches.len(),
            window_start,
            window_end,
        });

        match next_start {
            Some(next) => window_start = next,
            None => break,
        }
    }

    Ok(batches)
}

pub fn block_duration(granularity: i64, max_candles_per_batch: i64) -> Option<i64> {
    granularity.checked_mul(max_candles_per_batch)
}

/// Floor `timestamp` to the grid. Uses euclidean division so pre-epoch values floor downward.
pub fn align_to_grid(timestamp: i64, block_duration: i64) -> Option<i64> {
    timestamp
        .checked_div_euclid(block_duration)?
        .checked_mul(block_duration)
}
