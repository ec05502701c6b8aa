//! Pipeline configuration.
//!
//! Deserialized once (the CLI reads it from a JSON file, the provider's
//! convention) and validated once at startup, so the rest of the pipeline
//! can assume a well-formed column mapping.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A remote base URL a day's archive path is joined onto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    /// The canonical archive host has served an expired certificate chain
    /// for years; set this to keep fetching from it anyway.
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

impl EndpointConfig {
    /// Full URL for one day's archive file.
    pub fn url_for(&self, day: crate::domain::DayKey, suffix: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            day.relative_path(suffix)
        )
    }
}

/// One entry of the ordered column whitelist: a source header name and an
/// optional output name it is renamed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
}

impl ColumnSpec {
    pub fn output_name(&self) -> &str {
        self.target.as_deref().unwrap_or(&self.source)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// Everything the pipeline needs to resolve, parse, and normalize a range
/// of daily archives for one sensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Canonical archive endpoint, tried last.
    pub archive: EndpointConfig,
    /// Preferred mirror endpoint, tried first when present.
    #[serde(default)]
    pub mirror: Option<EndpointConfig>,
    /// File-name suffix of this sensor's daily CSV, e.g. `sds011_sensor_3659.csv`.
    pub sensor_csv_suffix: String,
    /// Ordered column whitelist with renames. Must include the timestamp column.
    pub columns: Vec<ColumnSpec>,
    /// Source header name of the column parsed as the temporal index.
    pub timestamp_column: String,
    /// Root directory of the local day-file cache.
    pub cache_dir: PathBuf,
    /// Days before the sensor's recorded activation are never requested.
    #[serde(default)]
    pub first_transmission_date: Option<NaiveDate>,
    /// Fixed grid spacing of the regridded output, in minutes.
    pub resample_minutes: i64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("column whitelist is empty")]
    EmptyColumns,
    #[error("timestamp column '{0}' is not in the column whitelist")]
    UnknownTimestampColumn(String),
    #[error("duplicate output column name '{0}'")]
    DuplicateColumn(String),
    #[error("resample period must be positive, got {0} minutes")]
    NonPositivePeriod(i64),
    #[error("smoothing alpha must lie in (0, 1] or be <= 0 for a no-op, got {0}")]
    InvalidAlpha(f64),
}

impl PipelineConfig {
    /// Validate the column mapping and grid period. Run once at startup;
    /// a failure here is a configuration defect, never a data problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::EmptyColumns);
        }
        if !self.columns.iter().any(|c| c.source == self.timestamp_column) {
            return Err(ConfigError::UnknownTimestampColumn(
                self.timestamp_column.clone(),
            ));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(self.columns.len());
        for spec in &self.columns {
            let name = spec.output_name();
            if seen.contains(&name) {
                return Err(ConfigError::DuplicateColumn(name.to_string()));
            }
            seen.push(name);
        }
        if self.resample_minutes <= 0 {
            return Err(ConfigError::NonPositivePeriod(self.resample_minutes));
        }
        Ok(())
    }

    /// Whitelist entries that carry values, i.e. everything but the
    /// timestamp column, in configured order.
    pub fn value_columns(&self) -> Vec<&ColumnSpec> {
        self.columns
            .iter()
            .filter(|c| c.source != self.timestamp_column)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DayKey;

    fn sample_config() -> PipelineConfig {
        serde_json::from_str(
            r#"{
                "archive": {"base_url": "https://archive.example.org/", "accept_invalid_certs": true},
                "mirror": {"base_url": "http://sensor.local/archive"},
                "sensor_csv_suffix": "sds011_sensor_3659.csv",
                "columns": [
                    {"source": "timestamp"},
                    {"source": "P1", "target": "PM10"},
                    {"source": "P2", "target": "PM2.5"}
                ],
                "timestamp_column": "timestamp",
                "cache_dir": "/tmp/airlog-cache",
                "first_transmission_date": "2017-03-28",
                "resample_minutes": 5
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn sample_config_is_valid() {
        let config = sample_config();
        config.validate().unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        let values: Vec<&str> = config.value_columns().iter().map(|c| c.output_name()).collect();
        assert_eq!(values, ["PM10", "PM2.5"]);
    }

    #[test]
    fn url_joins_without_double_slash() {
        let config = sample_config();
        let day = DayKey::new(NaiveDate::from_ymd_opt(2020, 3, 7).unwrap());
        assert_eq!(
            config.archive.url_for(day, &config.sensor_csv_suffix),
            "https://archive.example.org/2020-03-07/2020-03-07_sds011_sensor_3659.csv"
        );
    }

    #[test]
    fn timestamp_column_must_be_whitelisted() {
        let mut config = sample_config();
        config.timestamp_column = "time".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownTimestampColumn(_))
        ));
    }

    #[test]
    fn duplicate_output_names_rejected() {
        let mut config = sample_config();
        config.columns.push(ColumnSpec {
            source: "P3".into(),
            target: Some("PM10".into()),
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn zero_period_rejected() {
        let mut config = sample_config();
        config.resample_minutes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositivePeriod(0))
        ));
    }
}
