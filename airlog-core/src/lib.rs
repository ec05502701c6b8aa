//! airlog core: sensor-archive ingestion and normalization.
//!
//! The pipeline resolves one CSV archive file per day (local cache first,
//! then a preferred mirror, then the canonical archive endpoint), parses and
//! projects each day onto a configured column whitelist, assembles the days
//! into one chronological series, and normalizes the result: exponential
//! smoothing, duplicate-timestamp removal, and resampling onto a fixed
//! time grid with carry-forward backfill.
//!
//! Entry point: [`pipeline::get_data`]. Chart rendering and archive upload
//! are deliberately not part of this crate; callers consume the returned
//! [`domain::TimeSeries`].

pub mod config;
pub mod data;
pub mod domain;
pub mod fingerprint;
pub mod pipeline;
pub mod regrid;
pub mod smooth;
