//! airlog CLI: run the ingestion pipeline and export the normalized series.
//!
//! Thin wrapper around `airlog-core`: parses arguments, loads the JSON
//! pipeline configuration, invokes `get_data`, prints a run summary, and
//! writes the normalized series as semicolon-delimited CSV to stdout or a
//! file. All real decisions live in the core crate.

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use airlog_core::config::PipelineConfig;
use airlog_core::data::TIMESTAMP_FORMAT;
use airlog_core::domain::TimeSeries;
use airlog_core::fingerprint::series_fingerprint;
use airlog_core::pipeline::get_data;

#[derive(Parser)]
#[command(
    name = "airlog",
    about = "Fetch, normalize, and export daily sensor-archive data"
)]
struct Cli {
    /// Number of days back from today to fetch.
    #[arg(long, default_value_t = 5)]
    days: u32,

    /// End date (YYYY-MM-DD). Defaults to yesterday.
    #[arg(long)]
    end: Option<String>,

    /// Path to the JSON pipeline configuration.
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Smoothing factor alpha in (0, 1]; 0 disables smoothing.
    #[arg(long, default_value_t = 0.0)]
    alpha: f64,

    /// Write the normalized series to this file instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let raw = fs::read_to_string(&cli.config)
        .with_context(|| format!("failed to read config file {}", cli.config.display()))?;
    let config: PipelineConfig = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config file {}", cli.config.display()))?;

    let now = Local::now().date_naive();
    let end = match &cli.end {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("invalid --end date '{raw}'"))?,
        None => now - Duration::days(1),
    };

    let series = get_data(now, end, &config, cli.days, cli.alpha)?;

    info!(
        rows = series.len(),
        columns = ?series.columns(),
        from = %series.first_ts().map(|t| t.to_string()).unwrap_or_default(),
        to = %series.last_ts().map(|t| t.to_string()).unwrap_or_default(),
        fingerprint = %series_fingerprint(&series),
        "normalized series ready"
    );

    match &cli.output {
        Some(path) => {
            let file = fs::File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_csv(&series, file)?;
            info!(path = %path.display(), "series written");
        }
        None => {
            let stdout = std::io::stdout();
            write_csv(&series, stdout.lock())?;
        }
    }

    Ok(())
}

/// Export the series as semicolon CSV, the same dialect the archives use.
/// Undefined values (NaN) become empty fields, never zeros.
fn write_csv(series: &TimeSeries, writer: impl Write) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_writer(writer);

    let mut header = vec!["timestamp".to_string()];
    header.extend(series.columns().iter().cloned());
    wtr.write_record(&header).context("failed to write CSV header")?;

    for row in series.rows() {
        let mut record = Vec::with_capacity(1 + row.values.len());
        record.push(row.ts.format(TIMESTAMP_FORMAT).to_string());
        for value in &row.values {
            record.push(if value.is_nan() {
                String::new()
            } else {
                value.to_string()
            });
        }
        wtr.write_record(&record).context("failed to write CSV row")?;
    }
    wtr.flush().context("failed to flush CSV output")?;
    Ok(())
}
