//! Deduplication and fixed-grid resampling.
//!
//! Step 1 drops rows sharing an identical timestamp, keeping the first
//! occurrence in original order. Step 2 lays a strictly increasing grid at
//! a fixed period across `[min(ts), max(ts)]` and carries the most recent
//! preceding sample into each slot. A slot with no prior sample at all
//! yields an all-NaN row and is counted in the log; gaps are never
//! zero-filled.

use crate::domain::{SeriesRow, TimeSeries};
use chrono::Duration;
use tracing::{debug, warn};

/// Remove duplicate timestamps, keeping the first occurrence of each.
///
/// Expects a timestamp-sorted series (the pipeline sorts stably before any
/// normalization stage, so equal timestamps are adjacent and still in
/// arrival order). Returns the number of rows dropped.
pub fn dedup_series(series: &mut TimeSeries) -> usize {
    let rows = series.take_rows();
    let before = rows.len();
    let mut deduped = Vec::with_capacity(before);
    for row in rows {
        if deduped.last().map_or(true, |last: &SeriesRow| last.ts != row.ts) {
            deduped.push(row);
        }
    }
    let dropped = before - deduped.len();
    series.replace_rows(deduped);
    if dropped > 0 {
        debug!(dropped, "dropped duplicate timestamps");
    }
    dropped
}

/// Resample a sorted series onto a fixed-period timestamp grid.
///
/// The grid spans the deduplicated series' own first and last timestamps,
/// so the first slot always coincides with a real sample. Column names and
/// order are unchanged. An empty series regrids to itself.
pub fn regrid_series(mut series: TimeSeries, period: Duration) -> TimeSeries {
    assert!(period > Duration::zero(), "grid period must be positive");
    dedup_series(&mut series);

    let (first, last) = match (series.first_ts(), series.last_ts()) {
        (Some(first), Some(last)) => (first, last),
        _ => return series,
    };

    let ncols = series.columns().len();
    let mut out = TimeSeries::with_columns(series.columns().to_vec());
    let rows = series.rows();
    let mut idx = 0usize;
    let mut unfilled = 0usize;
    let mut slot = first;
    while slot <= last {
        while idx + 1 < rows.len() && rows[idx + 1].ts <= slot {
            idx += 1;
        }
        if rows[idx].ts <= slot {
            out.push_row(slot, rows[idx].values.clone());
        } else {
            unfilled += 1;
            out.push_row(slot, vec![f64::NAN; ncols]);
        }
        slot = slot + period;
    }

    if unfilled > 0 {
        warn!(unfilled, "grid slots with no preceding sample left undefined");
    }
    out
}
