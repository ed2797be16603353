use std::io::{self, Write};
use std::path::Path;

use log::info;

use crate::error::Result;
use crate::market::{Product, Timeframe};
use crate::output::{self, OutputFormat};
use crate::service::MarketService;
use crate::utils::{format_timestamp, parse_timestamp};

/// Arguments of the `candles` command after clap parsing.
#[derive(Debug, Clone)]
pub struct CandleExport<'a> {
    pub exchange: &'a str,
    pub symbol: &'a str,
    pub timeframe: &'a str,
    pub start: &'a str,
    pub end: &'a str,
    pub format: OutputFormat,
    pub output: Option<&'a Path>,
}

pub async fn export_candles(service: &MarketService, export: CandleExport<'_>) -> Result<usize> {
    let timeframe = Timeframe::from_label(export.timeframe)?;
    let start = parse_timestamp(export.start)?;
    let end = parse_timestamp(export.end)?;

    info!(
        "{} {} {} from {} to {}",
        export.exchange,
        export.symbol,
        timeframe,
        format_timestamp(start),
        format_timestamp(end)
    );

    let candles = service
        .fetch_candles(export.exchange, export.symbol, start, end, timeframe.seconds())
        .await?;

    output::export(export.output, export.format, &candles)?;
    if let Some(path) = export.output {
        info!("wrote {} candles to {}", candles.len(), path.display());
    }

    Ok(candles.len())
}

pub async fn search_products(
    service: &MarketService,
    query: &str,
    exchange: Option<&str>,
    limit: usize,
) -> Result<()> {
    let index = service.product_index(exchange).await?;
    let matches = index.search(query, limit);

    let mut stdout = io::stdout().lock();
    if matches.is_empty() {
        writeln!(stdout, "No instruments match `{}`.", query.trim())?;
        return Ok(());
    }
    write_products(&mut stdout, &matches)
}

fn write_products<W: Write>(writer: &mut W, products: &[&Product]) -> Result<()> {
    let id_width = products.iter().map(|p| p.id.len()).max().unwrap_or(0);
    let name_width = products.iter().map(|p| p.name.len()).max().unwrap_or(0);

    for product in products {
        writeln!(
            writer,
            "{:<id_width$}  {:<name_width$}  {}",
            product.id, product.name, product.exchange
        )?;
    }
    Ok(())
}

pub fn print_timeframes() -> Result<()> {
    write_timeframes(&mut io::stdout().lock())
}

fn write_timeframes<W: Write>(writer: &mut W) -> Result<()> {
    writeln!(writer, "{:<6}{:>8}", "label", "seconds")?;
    for timeframe in Timeframe::ALL {
        writeln!(writer, "{:<6}{:>8}", timeframe.label(), timeframe.seconds())?;
    }
    Ok(())
}
