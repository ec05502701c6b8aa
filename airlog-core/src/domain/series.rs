//! Time-indexed record containers.
//!
//! `DayRecords` is the transient result of parsing one day's archive file;
//! `TimeSeries` is the single growable accumulator the pipeline merges days
//! into. Both carry value columns only; the timestamp is the index, not a
//! column. `f64::NAN` is the crate-wide marker for an undefined value, so a
//! missing reading is always distinguishable from a real zero.

use super::day::DayKey;
use chrono::NaiveDateTime;
use thiserror::Error;

/// One sample: a timezone-naive timestamp plus one value per series column.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub ts: NaiveDateTime,
    pub values: Vec<f64>,
}

/// Parsed records of a single day, not yet merged.
#[derive(Debug, Clone)]
pub struct DayRecords {
    pub day: DayKey,
    /// Value column names, post-whitelist and post-rename, in configured order.
    pub columns: Vec<String>,
    pub rows: Vec<SeriesRow>,
}

/// A later day's column set deviated from the set fixed by the first day.
#[derive(Debug, Clone, Error)]
#[error("day {day} columns {got:?} do not match series columns {expected:?}")]
pub struct SchemaMismatch {
    pub day: DayKey,
    pub expected: Vec<String>,
    pub got: Vec<String>,
}

/// The chronologically-ordered accumulator for the whole requested range.
///
/// The column set is fixed by the first merged day; every subsequent merge
/// must match it exactly. Rows are kept in arrival order until
/// [`TimeSeries::sort_by_timestamp`] runs, which is stable so that
/// first-occurrence deduplication stays well-defined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    columns: Vec<String>,
    rows: Vec<SeriesRow>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct an empty series with a fixed column set.
    pub fn with_columns(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[SeriesRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [SeriesRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a single row. The row width must match the column set.
    pub fn push_row(&mut self, ts: NaiveDateTime, values: Vec<f64>) {
        assert_eq!(
            values.len(),
            self.columns.len(),
            "row width must match series columns"
        );
        self.rows.push(SeriesRow { ts, values });
    }

    /// Merge one day's records, preserving their arrival order.
    ///
    /// The first merged day fixes the column set. Returns the number of rows
    /// appended, or a [`SchemaMismatch`] (and leaves the series untouched)
    /// when a later day disagrees with the fixed set.
    pub fn append_day(&mut self, day: DayRecords) -> Result<usize, SchemaMismatch> {
        if self.columns.is_empty() && self.rows.is_empty() {
            self.columns = day.columns;
            self.rows = day.rows;
            return Ok(self.rows.len());
        }
        if day.columns != self.columns {
            return Err(SchemaMismatch {
                day: day.day,
                expected: self.columns.clone(),
                got: day.columns,
            });
        }
        let appended = day.rows.len();
        self.rows.extend(day.rows);
        Ok(appended)
    }

    /// Stable sort by timestamp. Equal timestamps keep arrival order.
    pub fn sort_by_timestamp(&mut self) {
        self.rows.sort_by_key(|row| row.ts);
    }

    pub fn first_ts(&self) -> Option<NaiveDateTime> {
        self.rows.first().map(|row| row.ts)
    }

    pub fn last_ts(&self) -> Option<NaiveDateTime> {
        self.rows.last().map(|row| row.ts)
    }

    /// True when every timestamp is strictly greater than its predecessor.
    pub fn is_strictly_increasing(&self) -> bool {
        self.rows.windows(2).all(|pair| pair[0].ts < pair[1].ts)
    }

    /// Extract one column as a contiguous vector.
    pub fn column_values(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row.values[index]).collect()
    }

    /// Take the rows out, leaving the column set in place. Plumbing for the
    /// normalization stages, which rebuild the row vector wholesale.
    pub(crate) fn take_rows(&mut self) -> Vec<SeriesRow> {
        std::mem::take(&mut self.rows)
    }

    pub(crate) fn replace_rows(&mut self, rows: Vec<SeriesRow>) {
        self.rows = rows;
    }
}
