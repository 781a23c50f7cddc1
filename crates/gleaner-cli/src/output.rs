use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use gleaner_core::models::ItemRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Csv,
}

/// Writes `records` to `path`, or to stdout when no path is given.
pub fn emit(records: &[ItemRecord], format: OutputFormat, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_records(records, format, &mut writer)?;
            writer.flush().context("Failed to flush output file")?;
            tracing::info!(path = %path.display(), records = records.len(), "Records written");
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_records(records, format, &mut lock)?;
        }
    }
    Ok(())
}

pub fn write_records<W: Write>(
    records: &[ItemRecord],
    format: OutputFormat,
    writer: W,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, records).context("Failed to encode JSON")?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            let mut csv = csv::Writer::from_writer(writer);
            for record in records {
                csv.serialize(record).context("Failed to encode CSV row")?;
            }
            csv.flush()?;
        }
    }
    Ok(())
}
