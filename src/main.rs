mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use candle_cli::app::{self, CandleExport};
use candle_cli::config::{load_config, Config};
use candle_cli::service::MarketService;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Timeframes = cli.command {
        app::print_timeframes()?;
        return Ok(());
    }

    let config = match cli.config.as_deref() {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::builtin(),
    };

    let service = MarketService::from_config(&config).context("Failed to set up exchanges")?;
    service.start();

    let outcome = run(&service, &cli.command).await;
    service.shutdown().await?;
    outcome
}

async fn run(service: &MarketService, command: &Commands) -> Result<()> {
    match command {
        Commands::Candles {
            exchange,
            symbol,
            timeframe,
            start,
            end,
            format,
            output,
        } => {
            let export = CandleExport {
                exchange,
                symbol,
                timeframe,
                start,
                end,
                format: *format,
                output: output.as_deref(),
            };
            app::export_candles(service, export)
                .await
                .with_context(|| format!("Failed to fetch {symbol} candles from {exchange}"))?;
        }
        Commands::Search {
            query,
            exchange,
            limit,
        } => {
            app::search_products(service, query, exchange.as_deref(), *limit).await?;
        }
        Commands::Timeframes => app::print_timeframes()?,
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .init();
}
