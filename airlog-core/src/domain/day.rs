//! Calendar day keys for archive files.
//!
//! Every remote archive file is identified by the day it covers. The same
//! `YYYY-MM-DD/YYYY-MM-DD_<suffix>` path convention is shared by the cache
//! layout and both remote URL templates, so it lives here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one per-day archive file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Archive file name for this day: `YYYY-MM-DD_<suffix>`.
    pub fn file_name(&self, suffix: &str) -> String {
        format!("{self}_{suffix}")
    }

    /// Path of this day's file relative to an archive root or cache root:
    /// `YYYY-MM-DD/YYYY-MM-DD_<suffix>`.
    pub fn relative_path(&self, suffix: &str) -> String {
        format!("{self}/{}", self.file_name(suffix))
    }

    /// Inclusive day-by-day iteration from `begin` to `end`.
    pub fn range_inclusive(begin: DayKey, end: DayKey) -> DayRange {
        DayRange {
            next: if begin <= end { Some(begin) } else { None },
            end,
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Iterator over an inclusive range of days in ascending order.
#[derive(Debug, Clone)]
pub struct DayRange {
    next: Option<DayKey>,
    end: DayKey,
}

impl Iterator for DayRange {
    type Item = DayKey;

    fn next(&mut self) -> Option<DayKey> {
        let current = self.next?;
        self.next = if current < self.end {
            current.0.succ_opt().map(DayKey)
        } else {
            None
        };
        Some(current)
    }
}
