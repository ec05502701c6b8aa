//! Archive fetching with cache precedence and mirror fallback.
//!
//! Resolution order for one day: local cache (skipped for the trailing,
//! possibly still-accumulating day), then the preferred mirror, then the
//! canonical archive endpoint. One attempt per endpoint, each carrying a
//! timeout. A response body containing `<` is an HTML/XML error page, not
//! sensor CSV, and is rejected before it can reach the cache.
//!
//! A day that exhausts every endpoint is reported as [`FetchError::Exhausted`]
//! and skipped by the pipeline; it never aborts a run.

use super::cache::{CsvCache, PayloadSource, RawPayload};
use crate::config::{EndpointConfig, PipelineConfig};
use crate::domain::DayKey;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("non-CSV payload from {url} (error page?)")]
    NonCsvPayload { url: String },
    #[error("no endpoint yielded a valid archive for {day}")]
    Exhausted { day: DayKey },
}

/// A payload is only plausibly sensor CSV when it contains no markup at all.
/// Both endpoints serve HTML error pages with a 200 status under load, so
/// status codes alone cannot be trusted.
pub fn is_csv_payload(text: &str) -> bool {
    !text.contains('<')
}

/// Resolves one day's raw CSV, trying cache, mirror, then canonical archive.
pub struct ArchiveFetcher {
    client: reqwest::blocking::Client,
    insecure_client: reqwest::blocking::Client,
    cache: CsvCache,
    mirror: Option<EndpointConfig>,
    archive: EndpointConfig,
    suffix: String,
}

impl ArchiveFetcher {
    pub fn new(
        cache: CsvCache,
        mirror: Option<EndpointConfig>,
        archive: EndpointConfig,
        suffix: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: build_client(timeout, false),
            insecure_client: build_client(timeout, true),
            cache,
            mirror,
            archive,
            suffix: suffix.into(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            CsvCache::new(&config.cache_dir, config.sensor_csv_suffix.as_str()),
            config.mirror.clone(),
            config.archive.clone(),
            config.sensor_csv_suffix.as_str(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }

    /// Resolve one day's payload.
    ///
    /// `trailing` marks the last (possibly still-accumulating) day of the
    /// requested range; its cache entry is never trusted as complete, so the
    /// cache is bypassed and the day re-fetched.
    pub fn fetch(&self, day: DayKey, trailing: bool) -> Result<RawPayload, FetchError> {
        if !trailing && self.cache.has(day) {
            match self.cache.read(day) {
                Ok(payload) if is_csv_payload(&payload.text) => {
                    debug!(day = %day, "serving day from cache");
                    return Ok(payload);
                }
                Ok(_) => {
                    // Markup in a cache entry means an error page slipped in
                    // before validation existed; treat as corruption.
                    warn!(day = %day, path = %self.cache.entry_path(day).display(),
                        "cached payload is not CSV; evicting and re-fetching");
                    let _ = self.cache.evict(day);
                }
                Err(e) => {
                    warn!(day = %day, error = %e, "cache read failed; falling back to network");
                }
            }
        }
        self.fetch_network(day)
    }

    /// Fetch from the network only, ignoring any cache entry. On success the
    /// payload is persisted to the cache before it is returned.
    pub fn fetch_network(&self, day: DayKey) -> Result<RawPayload, FetchError> {
        let candidates = self
            .mirror
            .iter()
            .map(|m| (m, PayloadSource::Mirror))
            .chain(std::iter::once((&self.archive, PayloadSource::Archive)));

        for (endpoint, source) in candidates {
            let url = endpoint.url_for(day, &self.suffix);
            match self.try_endpoint(endpoint, &url) {
                Ok(text) => {
                    debug!(day = %day, url = %url, source = %source, "fetched day payload");
                    if let Err(e) = self.cache.write(day, &text) {
                        // The payload is still good; only persistence failed.
                        warn!(day = %day, error = %e, "failed to persist payload to cache");
                    }
                    return Ok(RawPayload { text, source });
                }
                Err(e) => {
                    warn!(day = %day, url = %url, error = %e, "endpoint attempt failed");
                }
            }
        }
        Err(FetchError::Exhausted { day })
    }

    fn try_endpoint(&self, endpoint: &EndpointConfig, url: &str) -> Result<String, FetchError> {
        let client = if endpoint.accept_invalid_certs {
            &self.insecure_client
        } else {
            &self.client
        };
        let response = client.get(url).send().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let text = response.text().map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        if !is_csv_payload(&text) {
            return Err(FetchError::NonCsvPayload {
                url: url.to_string(),
            });
        }
        Ok(text)
    }
}

fn build_client(timeout: Duration, accept_invalid_certs: bool) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .expect("failed to build HTTP client")
}
