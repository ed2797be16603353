pub mod app;
pub mod config;
pub mod error;
pub mod fetch;
pub mod market;
pub mod output;
pub mod providers;
pub mod search;
pub mod service;
pub mod utils;

pub use error::{AppError, Result};
pub use market::{Candle, CandleRequest, Timeframe};
pub use service::MarketService;
