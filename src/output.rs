use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;

use crate::error::{Context, Result};
use crate::market::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
}

/// Pretty-printed JSON array of `{time, open, high, low, close, volume}` objects.
pub fn write_json<W: Write>(mut writer: W, candles: &[Candle]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, candles)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(writer: W, candles: &[Candle]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for candle in candles {
        writer.serialize(candle)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_candles<W: Write>(writer: W, format: OutputFormat, candles: &[Candle]) -> Result<()> {
    match format {
        OutputFormat::Json => write_json(writer, candles),
        OutputFormat::Csv => write_csv(writer, candles),
    }
}

/// Write to `path`, or to stdout when no path is given.
pub fn export(path: Option<&Path>, format: OutputFormat, candles: &[Candle]) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            write_candles(BufWriter::new(file), format, candles)
        }
        None => write_candles(io::stdout().lock(), format, candles),
    }
}
