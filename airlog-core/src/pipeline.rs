//! Pipeline driver: resolve, parse, assemble, then normalize.
//!
//! One run walks the requested day range in order (cache, then mirror, then
//! canonical archive per day), merges each parsed day into a single
//! accumulator, and finalizes once: stable sort, exponential smoothing,
//! deduplication, fixed-grid resampling.
//!
//! Per-day failures are explicit outcomes, not exceptions in disguise: a
//! transient fetch or payload problem skips that day with a logged reason, a
//! missing whitelisted column aborts the whole run (it is a configuration
//! defect), and a range that yields no usable day at all is a terminal error
//! rather than a silently empty series.

use crate::config::{ConfigError, PipelineConfig};
use crate::data::cache::PayloadSource;
use crate::data::{parse_day, ArchiveFetcher, FetchError, ParseError};
use crate::domain::{DayKey, DayRecords, SchemaMismatch, TimeSeries};
use crate::fingerprint::series_fingerprint;
use crate::regrid::regrid_series;
use crate::smooth::smooth_series;
use chrono::{Duration, NaiveDate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Cooperative cancellation flag, checked at the top of every day iteration.
/// The in-flight day is discarded, never half-cached.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A whitelisted column is absent from a day's header: the configured
    /// schema and the archive disagree, and continuing would fabricate data.
    #[error("required column '{column}' missing in archive for {day}")]
    Schema { column: String, day: DayKey },
    #[error("no usable sensor data between {begin} and {end}")]
    EmptyRange { begin: DayKey, end: DayKey },
    #[error("run cancelled")]
    Cancelled,
}

/// Why a day contributed nothing to the series.
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error(transparent)]
    Unavailable(FetchError),
    #[error("unusable payload: {0}")]
    Unusable(String),
    #[error(transparent)]
    SchemaDrift(SchemaMismatch),
}

/// Explicit per-day result inspected by the driving loop.
#[derive(Debug)]
pub enum DayOutcome {
    Merged {
        day: DayKey,
        rows: usize,
        source: PayloadSource,
    },
    Skipped {
        day: DayKey,
        reason: SkipReason,
    },
}

/// Run the whole pipeline and return the normalized series.
///
/// The range is `[now - lookback_days, end_date]`, with the begin date
/// clamped up to the sensor's first transmission date when one is
/// configured. `smoothing_alpha <= 0` disables smoothing.
pub fn get_data(
    now: NaiveDate,
    end_date: NaiveDate,
    config: &PipelineConfig,
    lookback_days: u32,
    smoothing_alpha: f64,
) -> Result<TimeSeries, PipelineError> {
    get_data_with_cancel(now, end_date, config, lookback_days, smoothing_alpha, &CancelToken::new())
}

/// As [`get_data`], but abortable between days via `cancel`.
pub fn get_data_with_cancel(
    now: NaiveDate,
    end_date: NaiveDate,
    config: &PipelineConfig,
    lookback_days: u32,
    smoothing_alpha: f64,
    cancel: &CancelToken,
) -> Result<TimeSeries, PipelineError> {
    config.validate()?;
    if smoothing_alpha > 1.0 {
        return Err(ConfigError::InvalidAlpha(smoothing_alpha).into());
    }

    let begin = DayKey::new(resolve_begin(now, lookback_days, config.first_transmission_date));
    let end = DayKey::new(end_date);
    if begin > end {
        return Err(PipelineError::EmptyRange { begin, end });
    }
    info!(begin = %begin, end = %end, "resolving archive range");

    let fetcher = ArchiveFetcher::from_config(config);
    let mut series = TimeSeries::new();
    let mut merged_days = 0usize;

    for day in DayKey::range_inclusive(begin, end) {
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let trailing = day == end || day.date() >= now;
        match ingest_day(&fetcher, config, &mut series, day, trailing)? {
            DayOutcome::Merged { rows, source, .. } => {
                info!(day = %day, rows, source = %source, "merged day");
                merged_days += 1;
            }
            DayOutcome::Skipped { reason, .. } => {
                warn!(day = %day, reason = %reason, "skipped day");
            }
        }
    }

    if merged_days == 0 || series.is_empty() {
        return Err(PipelineError::EmptyRange { begin, end });
    }

    series.sort_by_timestamp();
    smooth_series(&mut series, smoothing_alpha);
    let series = regrid_series(series, Duration::minutes(config.resample_minutes));

    info!(
        rows = series.len(),
        columns = ?series.columns(),
        fingerprint = %series_fingerprint(&series),
        "pipeline ready"
    );
    Ok(series)
}

/// Begin date of the range: `now - lookback_days`, never before the
/// sensor's first transmission date.
fn resolve_begin(now: NaiveDate, lookback_days: u32, first_tx: Option<NaiveDate>) -> NaiveDate {
    let begin = now - Duration::days(i64::from(lookback_days));
    match first_tx {
        Some(first_tx) if first_tx > begin => {
            info!(begin = %begin, first_tx = %first_tx, "clamping begin date to first transmission");
            first_tx
        }
        _ => begin,
    }
}

/// Fetch, parse, and merge one day, mapping every failure mode to an
/// explicit outcome for the driving loop to inspect.
fn ingest_day(
    fetcher: &ArchiveFetcher,
    config: &PipelineConfig,
    series: &mut TimeSeries,
    day: DayKey,
    trailing: bool,
) -> Result<DayOutcome, PipelineError> {
    let payload = match fetcher.fetch(day, trailing) {
        Ok(payload) => payload,
        Err(e) => return Ok(skipped(day, SkipReason::Unavailable(e))),
    };

    let source = payload.source;
    let records = match parse_payload(fetcher, config, day, source, &payload.text)? {
        Ok(records) => records,
        Err(reason) => return Ok(skipped(day, reason)),
    };

    match series.append_day(records) {
        Ok(rows) => Ok(DayOutcome::Merged { day, rows, source }),
        Err(mismatch) => Ok(skipped(day, SkipReason::SchemaDrift(mismatch))),
    }
}

/// Parse a payload, recovering once from cache corruption by evicting the
/// entry and re-fetching the day from the network.
///
/// The outer `Result` aborts the run (schema defect); the inner one skips
/// the day.
fn parse_payload(
    fetcher: &ArchiveFetcher,
    config: &PipelineConfig,
    day: DayKey,
    source: PayloadSource,
    text: &str,
) -> Result<Result<DayRecords, SkipReason>, PipelineError> {
    match parse_day(day, text, &config.columns, &config.timestamp_column) {
        Ok(records) => Ok(Ok(records)),
        Err(e) if source == PayloadSource::Cache => {
            warn!(day = %day, error = %e, "cached payload failed to parse; evicting and re-fetching");
            if let Err(evict_err) = fetcher.cache().evict(day) {
                warn!(day = %day, error = %evict_err, "failed to evict corrupt cache entry");
            }
            let refetched = match fetcher.fetch_network(day) {
                Ok(payload) => payload,
                Err(fetch_err) => return Ok(Err(SkipReason::Unavailable(fetch_err))),
            };
            match parse_day(day, &refetched.text, &config.columns, &config.timestamp_column) {
                Ok(records) => Ok(Ok(records)),
                Err(parse_err) => Ok(Err(classify_network_parse_error(parse_err)?)),
            }
        }
        Err(e) => Ok(Err(classify_network_parse_error(e)?)),
    }
}

/// A missing column in fresh network data is a configuration defect and
/// escalates; anything else about the payload is transient.
fn classify_network_parse_error(error: ParseError) -> Result<SkipReason, PipelineError> {
    match error {
        ParseError::MissingColumn { column, day } => Err(PipelineError::Schema { column, day }),
        ParseError::Malformed { reason, .. } => Ok(SkipReason::Unusable(reason)),
    }
}

fn skipped(day: DayKey, reason: SkipReason) -> DayOutcome {
    DayOutcome::Skipped { day, reason }
}
