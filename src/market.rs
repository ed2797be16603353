use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One OHLCV data point. `timestamp` is the candle open time in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "time")]
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Supported candle timeframes. Anything else is rejected before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timeframe {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    SixHours,
    OneDay,
}

impl Timeframe {
    pub const ALL: [Timeframe; 6] = [
        Timeframe::OneMinute,
        Timeframe::FiveMinutes,
        Timeframe::FifteenMinutes,
        Timeframe::OneHour,
        Timeframe::SixHours,
        Timeframe::OneDay,
    ];

    pub fn seconds(self) -> i64 {
        match self {
            Timeframe::OneMinute => 60,
            Timeframe::FiveMinutes => 300,
            Timeframe::FifteenMinutes => 900,
            Timeframe::OneHour => 3_600,
            Timeframe::SixHours => 21_600,
            Timeframe::OneDay => 86_400,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1H",
            Timeframe::SixHours => "6H",
            Timeframe::OneDay => "1D",
        }
    }

    pub fn from_seconds(granularity: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|timeframe| timeframe.seconds() == granularity)
            .ok_or(AppError::UnsupportedGranularity(granularity))
    }

    /// Labels are case-sensitive: `1m` is one minute, `1M` is not accepted.
    pub fn from_label(label: &str) -> Result<Self> {
        let trimmed = label.trim();
        Self::ALL
            .into_iter()
            .find(|timeframe| timeframe.label() == trimmed)
            .ok_or_else(|| AppError::InvalidRequest(format!("unsupported timeframe `{trimmed}`")))
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A request for candles over `[start, end)` at a given granularity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandleRequest {
    pub symbol: String,
    pub exchange_id: String,
    pub start: i64,
    pub end: i64,
    pub granularity: i64,
}

impl CandleRequest {
    pub fn new(
        exchange_id: impl Into<String>,
        symbol: impl Into<String>,
        start: i64,
        end: i64,
        granularity: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange_id: exchange_id.into(),
            start,
            end,
            granularity,
        }
    }

    /// Check the request shape. `end <= start` is not an error; it plans to zero batches.
    pub fn validate(&self) -> Result<Timeframe> {
        if self.symbol.trim().is_empty() {
            return Err(AppError::InvalidRequest("symbol must not be empty".into()));
        }
        if self.granularity <= 0 {
            return Err(AppError::UnsupportedGranularity(self.granularity));
        }
        Timeframe::from_seconds(self.granularity)
    }

    pub fn is_empty_range(&self) -> bool {
        self.end <= self.start
    }
}

/// A tradable instrument listed by an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub exchange: String,
}
