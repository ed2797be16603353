use std::path::PathBuf;

use clap::{Parser, Subcommand};

use candle_cli::output::OutputFormat;
use candle_cli::search::DEFAULT_SEARCH_LIMIT;

#[derive(Parser)]
#[command(name = "candle-cli")]
#[command(about = "Fetch historical OHLCV candles from crypto exchanges in cache-friendly batches")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch candles for a symbol over a time range
    Candles {
        #[arg(short, long, default_value = "coinbase")]
        exchange: String,

        /// Exchange symbol, e.g. BTC-USD
        #[arg(short, long)]
        symbol: String,

        /// One of 1m, 5m, 15m, 1H, 6H, 1D
        #[arg(short, long, default_value = "1H")]
        timeframe: String,

        /// Range start: unix seconds, RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// Range end (exclusive), same formats as --start
        #[arg(long)]
        end: String,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search tradable instruments by name prefix
    Search {
        query: String,

        /// Only list products from this exchange
        #[arg(short, long)]
        exchange: Option<String>,

        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },

    /// List supported timeframes
    Timeframes,
}
