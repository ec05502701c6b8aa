//! Day-file parsing: semicolon-delimited CSV into typed per-day records.
//!
//! The parser projects onto the configured column whitelist (order
//! preserved), applies renames, and parses the designated timestamp column.
//! A whitelisted column missing from an otherwise recognizable header is a
//! configuration/schema defect and aborts the whole run; a payload whose
//! header matches nothing at all is just corrupt. Individual rows that fail
//! to parse are counted and skipped.

use crate::config::ColumnSpec;
use crate::domain::{DayKey, DayRecords, SeriesRow};
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{debug, warn};

/// Timestamp layout used by the archive files, e.g. `2020-03-07T00:02:43`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum ParseError {
    /// Schema defect: the header is recognizable but a configured column is
    /// absent. Propagates and aborts the run.
    #[error("required column '{column}' missing in archive for {day}")]
    MissingColumn { column: String, day: DayKey },
    /// The payload is not usable tabular data at all. For cached payloads
    /// this means corruption (evict and re-fetch); for fresh network
    /// payloads the day is skipped as transient.
    #[error("malformed archive for {day}: {reason}")]
    Malformed { day: DayKey, reason: String },
}

/// Parse one day's raw CSV text into records restricted to the whitelist.
pub fn parse_day(
    day: DayKey,
    text: &str,
    columns: &[ColumnSpec],
    timestamp_column: &str,
) -> Result<DayRecords, ParseError> {
    if text.trim().is_empty() {
        return Err(malformed(day, "empty payload"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| malformed(day, &format!("unreadable header: {e}")))?
        .clone();
    let header_index = |name: &str| headers.iter().position(|h| h.trim() == name);

    // A header matching none of the configured columns is corruption, not a
    // schema mismatch; only a partially matching header is the latter.
    let found = columns.iter().filter(|c| header_index(&c.source).is_some()).count();
    if found == 0 {
        return Err(malformed(day, "header matches no configured column"));
    }
    for spec in columns {
        if header_index(&spec.source).is_none() {
            return Err(ParseError::MissingColumn {
                column: spec.source.clone(),
                day,
            });
        }
    }

    let ts_idx = header_index(timestamp_column).ok_or_else(|| ParseError::MissingColumn {
        column: timestamp_column.to_string(),
        day,
    })?;
    let value_cols: Vec<(usize, String)> = columns
        .iter()
        .filter(|spec| spec.source != timestamp_column)
        .map(|spec| {
            let idx = header_index(&spec.source).expect("presence checked above");
            (idx, spec.output_name().to_string())
        })
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        let ts = record
            .get(ts_idx)
            .and_then(|raw| NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok());
        let Some(ts) = ts else {
            skipped += 1;
            continue;
        };
        let values = value_cols
            .iter()
            .map(|(idx, _)| parse_value(record.get(*idx)))
            .collect();
        rows.push(SeriesRow { ts, values });
    }

    if skipped > 0 {
        warn!(day = %day, skipped, kept = rows.len(), "skipped unparseable rows");
    }
    if rows.is_empty() {
        return Err(malformed(day, "no parsable data rows"));
    }
    debug!(day = %day, rows = rows.len(), "parsed day records");

    Ok(DayRecords {
        day,
        columns: value_cols.into_iter().map(|(_, name)| name).collect(),
        rows,
    })
}

/// Empty or unparseable numeric fields become NaN, the explicit missing
/// marker, never zero.
fn parse_value(raw: Option<&str>) -> f64 {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(f64::NAN)
}

fn malformed(day: DayKey, reason: &str) -> ParseError {
    ParseError::Malformed {
        day,
        reason: reason.to_string(),
    }
}
