//! Local day-file cache.
//!
//! Layout: `{cache_dir}/YYYY-MM-DD/YYYY-MM-DD_<suffix>`, one semicolon CSV
//! file per day, UTF-8, exactly as served by the remote endpoints.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place) so a crash mid-write
//!   never leaves a truncated entry that a later run trusts
//! - Eviction for delete-on-corruption: a cached payload that fails
//!   validation or parsing is removed so the next attempt goes to the network

use crate::domain::DayKey;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Where a payload was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Cache,
    Mirror,
    Archive,
}

impl fmt::Display for PayloadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadSource::Cache => write!(f, "cache"),
            PayloadSource::Mirror => write!(f, "mirror"),
            PayloadSource::Archive => write!(f, "archive"),
        }
    }
}

/// One day's raw CSV text plus its provenance.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub text: String,
    pub source: PayloadSource,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache entry for {day}")]
    NotFound { day: DayKey },
    #[error("cache I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// File cache of raw per-day archive payloads.
pub struct CsvCache {
    cache_dir: PathBuf,
    suffix: String,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            suffix: suffix.into(),
        }
    }

    /// Path of the cache entry for a day.
    pub fn entry_path(&self, day: DayKey) -> PathBuf {
        self.cache_dir
            .join(day.to_string())
            .join(day.file_name(&self.suffix))
    }

    pub fn has(&self, day: DayKey) -> bool {
        self.entry_path(day).is_file()
    }

    pub fn read(&self, day: DayKey) -> Result<RawPayload, CacheError> {
        let path = self.entry_path(day);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(RawPayload {
                text,
                source: PayloadSource::Cache,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::NotFound { day }),
            Err(e) => Err(io_err(&path, e)),
        }
    }

    /// Persist one day's payload atomically: write a sibling `.tmp` file,
    /// then rename it into place.
    pub fn write(&self, day: DayKey, text: &str) -> Result<(), CacheError> {
        let path = self.entry_path(day);
        let dir = path.parent().expect("cache entry always has a parent dir");
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, text).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_err(&path, e)
        })?;
        debug!(day = %day, path = %path.display(), bytes = text.len(), "cached day payload");
        Ok(())
    }

    /// Remove a day's entry. Evicting an absent entry is not an error.
    pub fn evict(&self, day: DayKey) -> Result<(), CacheError> {
        let path = self.entry_path(day);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(day = %day, path = %path.display(), "evicted cache entry");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path, e)),
        }
    }
}

fn io_err(path: &Path, source: io::Error) -> CacheError {
    CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}
