//! Domain types: day keys and time-indexed series.

pub mod day;
pub mod series;

pub use day::{DayKey, DayRange};
pub use series::{DayRecords, SchemaMismatch, SeriesRow, TimeSeries};
