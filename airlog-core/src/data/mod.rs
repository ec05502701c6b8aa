//! Archive acquisition: local cache, network fetch with fallback, parsing.

pub mod cache;
pub mod fetch;
pub mod parse;

pub use cache::{CacheError, CsvCache, PayloadSource, RawPayload};
pub use fetch::{ArchiveFetcher, FetchError};
pub use parse::{parse_day, ParseError, TIMESTAMP_FORMAT};
